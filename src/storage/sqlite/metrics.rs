//! Operation metrics for storage backends.

use std::time::Instant;

/// Records `storage_operations_total` and `storage_operation_duration_ms`
/// for one storage call.
///
/// `status` is `"success"` or `"error"`.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Runs `f`, recording metrics under `backend` / `operation`.
pub fn timed<T>(
    backend: &'static str,
    operation: &'static str,
    f: impl FnOnce() -> crate::Result<T>,
) -> crate::Result<T> {
    let start = Instant::now();
    let result = f();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation_metrics_without_recorder() {
        // No recorder is installed in unit tests; recording must be a no-op.
        let start = Instant::now();
        record_operation_metrics("sqlite", "get", start, "success");
        record_operation_metrics("memory", "query", start, "error");
    }

    #[test]
    fn test_timed_passes_result_through() {
        let ok = timed("sqlite", "get", || Ok(5));
        assert_eq!(ok.unwrap(), 5);
        let err: crate::Result<()> = timed("sqlite", "get", || {
            Err(crate::Error::InvalidInput("x".to_string()))
        });
        assert!(err.is_err());
    }
}
