pub mod cache_store;
pub mod memory;
pub mod retriever;
pub mod schema;
pub mod store;
pub mod table;
pub mod writer;

pub use cache_store::LanceCacheStore;
pub use memory::InMemoryIndex;
pub use retriever::VectorRetriever;
pub use store::LanceVectorIndex;
pub use writer::{IngestReport, Ingestor};
