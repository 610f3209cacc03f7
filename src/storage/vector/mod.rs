//! Vector store implementations.

mod chroma;
mod memory;

pub use chroma::ChromaVectorStore;
pub use memory::InMemoryVectorStore;
