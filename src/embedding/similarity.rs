//! Vector similarity helpers.

use crate::{Error, Result};

/// Cosine similarity in `-1.0..=1.0`.
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a * norm_b)
}

/// Euclidean distance.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the lengths differ.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&[1.0, 0.0], &[1.0, 0.0], 1.0; "identical")]
    #[test_case(&[1.0, 0.0], &[0.0, 1.0], 0.0; "orthogonal")]
    #[test_case(&[1.0, 0.0], &[-1.0, 0.0], -1.0; "opposite")]
    #[test_case(&[1.0, 0.0], &[1.0], 0.0; "length mismatch")]
    #[test_case(&[0.0, 0.0], &[1.0, 0.0], 0.0; "zero norm")]
    fn test_cosine_similarity(a: &[f32], b: &[f32], expected: f32) {
        assert!((cosine_similarity(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance() {
        let d = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
        assert!(euclidean_distance(&[0.0], &[1.0, 2.0]).is_err());
    }
}
