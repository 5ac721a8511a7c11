//! Filesystem adapters for the `local` backend
mod atomic_write;
mod fs_blob_store;
mod fs_metadata_store;

pub use fs_blob_store::FileSystemBlobStore;
pub use fs_metadata_store::FileSystemMetadataStore;
