/// In-memory adapters backed by DashMap, for tests and embedding
mod memory_blob_store;
mod memory_metadata_store;

pub use memory_blob_store::InMemoryBlobStore;
pub use memory_metadata_store::InMemoryMetadataStore;
