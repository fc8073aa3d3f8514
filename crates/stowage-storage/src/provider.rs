use async_trait::async_trait;
use stowage_core::error::StorageError;
use stowage_core::types::{BlobPage, ContainerRef, ContinuationToken, PublicAccess};

/// The five primitives a blob service has to offer.
///
/// Implementations own transport concerns (auth, retries, chunking). Callers
/// rely only on the documented semantics of each call.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Create the container, succeeding if it already exists.
    async fn create_container_if_absent(&self, container: &ContainerRef)
    -> Result<(), StorageError>;

    /// Replace the container's public access level.
    async fn set_container_permissions(
        &self,
        container: &ContainerRef,
        access: PublicAccess,
    ) -> Result<(), StorageError>;

    /// Fetch one page of the container listing.
    ///
    /// Pass `None` for the first page, then each returned token unchanged.
    /// A page without a token is the last one.
    async fn list_blobs_segment(
        &self,
        container: &ContainerRef,
        token: Option<ContinuationToken>,
    ) -> Result<BlobPage, StorageError>;

    /// Write the whole blob, replacing any existing content.
    async fn put_blob(
        &self,
        container: &ContainerRef,
        blob: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Read the whole blob. Missing blobs yield `StorageError::NotFound`.
    async fn get_blob(&self, container: &ContainerRef, blob: &str)
    -> Result<Vec<u8>, StorageError>;

    /// Backend name for display.
    fn name(&self) -> &str;
}
