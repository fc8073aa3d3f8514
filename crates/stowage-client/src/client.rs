use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stowage_core::config::{ConnectionDescriptor, StowageConfig};
use stowage_core::error::{
    ListingError, ProvisioningStage, Result, StorageError, StowageError, TransferError,
};
use stowage_core::types::{BlobItem, BlobRef, ContainerRef, PublicAccess};
use stowage_storage::{BackendOptions, StorageBackend, create_backend};

use crate::naming::downloaded_path;

/// Every container resolved through the client ends up with this access level.
const PROVISIONED_ACCESS: PublicAccess = PublicAccess::Blob;

/// Knobs that shape client behaviour without changing operation semantics.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Fail a listing that needs more than this many pages. Unbounded when unset.
    pub max_pages: Option<u32>,
    pub backend: BackendOptions,
}

impl ClientOptions {
    pub fn from_config(config: &StowageConfig) -> Self {
        Self {
            max_pages: config.stowage.max_pages,
            backend: BackendOptions {
                local_page_size: config.stowage.local_page_size,
            },
        }
    }
}

/// Account-level session: the backend built from the connection descriptor.
///
/// Read-only after construction and shared by every clone of the client.
#[derive(Clone)]
pub struct AccountHandle {
    label: String,
    backend: Arc<dyn StorageBackend>,
}

impl AccountHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountHandle")
            .field("label", &self.label)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Facade over a [`StorageBackend`].
///
/// Cloning is cheap. Concurrent calls are safe as long as each one works on
/// its own local file.
#[derive(Debug, Clone)]
pub struct BlobClient {
    account: AccountHandle,
    container: Option<ContainerRef>,
    max_pages: Option<u32>,
}

impl BlobClient {
    /// Parse `descriptor` and build the backend it selects.
    pub fn connect(descriptor: &str) -> Result<Self> {
        Self::connect_with_options(descriptor, ClientOptions::default())
    }

    pub fn connect_with_options(descriptor: &str, options: ClientOptions) -> Result<Self> {
        let parsed = ConnectionDescriptor::parse(descriptor)?;
        let backend = create_backend(&parsed, &options.backend).map_err(|e| {
            StowageError::config(format!("cannot build backend for {}: {e}", parsed.label()))
        })?;
        tracing::debug!(account = %parsed.label(), backend = backend.name(), "Connected");

        Ok(Self {
            account: AccountHandle {
                label: parsed.label(),
                backend,
            },
            container: None,
            max_pages: normalize_max_pages(options.max_pages),
        })
    }

    /// Connect, then resolve `container` and make it the active container.
    pub async fn connect_with_container(
        descriptor: &str,
        container: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        let mut client = Self::connect_with_options(descriptor, options)?;
        let resolved = client.resolve_container(container).await?;
        client.container = Some(resolved);
        Ok(client)
    }

    /// Wrap an already-built backend.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            account: AccountHandle {
                label: backend.name().to_string(),
                backend,
            },
            container: None,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = normalize_max_pages(max_pages);
        self
    }

    pub fn account(&self) -> &AccountHandle {
        &self.account
    }

    /// The container resolved at construction, if any.
    pub fn container(&self) -> Option<&ContainerRef> {
        self.container.as_ref()
    }

    fn backend(&self) -> &dyn StorageBackend {
        self.account.backend()
    }

    fn active_container(&self) -> Result<&ContainerRef> {
        self.container
            .as_ref()
            .ok_or_else(|| StowageError::config("no active container; connect with a container name"))
    }

    /// Ensure `name` exists and is publicly blob-readable.
    ///
    /// Succeeds when the container already exists. The access level is written
    /// on every call, replacing whatever was there before.
    pub async fn resolve_container(&self, name: &str) -> Result<ContainerRef> {
        let provisioning = |stage: ProvisioningStage, source: StorageError| StowageError::Provisioning {
            container: name.to_string(),
            stage,
            source,
        };

        let container =
            ContainerRef::new(name).map_err(|e| provisioning(ProvisioningStage::Create, e))?;

        self.backend()
            .create_container_if_absent(&container)
            .await
            .map_err(|e| {
                tracing::error!(container = name, error = %e, "Container create failed");
                provisioning(ProvisioningStage::Create, e)
            })?;

        self.backend()
            .set_container_permissions(&container, PROVISIONED_ACCESS)
            .await
            .map_err(|e| {
                tracing::error!(container = name, error = %e, "Setting container permissions failed");
                provisioning(ProvisioningStage::SetPermissions, e)
            })?;

        tracing::info!(container = name, access = %PROVISIONED_ACCESS, "Container ready");
        Ok(container)
    }

    /// Every item in `container`, in the order the backend's pages deliver them.
    ///
    /// Either the whole listing is returned or an error is; items from pages
    /// fetched before a failure are discarded.
    pub async fn list_all(&self, container: &ContainerRef) -> Result<Vec<BlobItem>> {
        let failed = |source: ListingError| StowageError::Listing {
            container: container.name().to_string(),
            source,
        };

        let mut items = Vec::new();
        let mut token = None;
        let mut page: u32 = 0;

        loop {
            page += 1;
            let segment = self
                .backend()
                .list_blobs_segment(container, token)
                .await
                .map_err(|source| failed(ListingError::Page { page, source }))?;

            tracing::debug!(
                container = container.name(),
                page,
                items = segment.items.len(),
                more = segment.continuation.is_some(),
                "Fetched listing page"
            );
            items.extend(segment.items);

            match segment.continuation {
                None => break,
                Some(next) => {
                    if let Some(limit) = self.max_pages {
                        if page >= limit {
                            tracing::warn!(
                                container = container.name(),
                                limit,
                                "Listing page limit reached with more pages pending"
                            );
                            return Err(failed(ListingError::PageLimitExceeded { limit }));
                        }
                    }
                    token = Some(next);
                }
            }
        }

        tracing::debug!(
            container = container.name(),
            pages = page,
            items = items.len(),
            "Listing complete"
        );
        Ok(items)
    }

    /// [`list_all`](Self::list_all) on the active container.
    pub async fn list_active(&self) -> Result<Vec<BlobItem>> {
        let container = self.active_container()?;
        self.list_all(container).await
    }

    /// Upload `source` as `blob_name`, replacing any existing blob.
    ///
    /// The local file is read in full before the backend is contacted.
    pub async fn upload(
        &self,
        container: &ContainerRef,
        source: &Path,
        blob_name: &str,
    ) -> Result<BlobRef> {
        let blob = container.blob(blob_name);
        if blob_name.is_empty() {
            return Err(remote_error(
                &blob,
                StorageError::Rejected("blob name is empty".to_string()),
            ));
        }

        let data = tokio::fs::read(source)
            .await
            .map_err(|e| local_error(source, e))?;
        let size = data.len();

        self.backend()
            .put_blob(container, blob_name, data)
            .await
            .map_err(|e| remote_error(&blob, e))?;

        tracing::info!(blob = %blob, bytes = size, source = %source.display(), "Uploaded");
        Ok(blob)
    }

    /// Download `blob` next to `source`, at [`downloaded_path`]`(source)`.
    ///
    /// Returns the path written.
    pub async fn download(&self, blob: &BlobRef, source: &Path) -> Result<PathBuf> {
        let destination = downloaded_path(source);
        tracing::info!(blob = %blob, destination = %destination.display(), "Downloading");
        self.download_to(blob, &destination).await?;
        Ok(destination)
    }

    /// Download `blob` to exactly `destination`.
    ///
    /// Content is staged in a temporary file in the destination directory and
    /// renamed over `destination` once complete, on the blocking pool. On
    /// failure the destination is left as it was.
    pub async fn download_to(&self, blob: &BlobRef, destination: &Path) -> Result<()> {
        let data = self
            .backend()
            .get_blob(&blob.container, &blob.name)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    StowageError::Transfer(TransferError::NotFound {
                        container: blob.container.name().to_string(),
                        blob: blob.name.clone(),
                    })
                } else {
                    remote_error(blob, e)
                }
            })?;

        let size = data.len();
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomically(&target, &data))
            .await
            .map_err(std::io::Error::other)
            .and_then(|written| written)
            .map_err(|e| local_error(destination, e))?;

        tracing::info!(blob = %blob, bytes = size, destination = %destination.display(), "Downloaded");
        Ok(())
    }
}

fn normalize_max_pages(max_pages: Option<u32>) -> Option<u32> {
    max_pages.map(|n| n.max(1))
}

fn write_atomically(destination: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(data)?;
    staged.flush()?;
    staged.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

fn local_error(path: &Path, source: std::io::Error) -> StowageError {
    StowageError::Transfer(TransferError::LocalIo {
        path: path.to_path_buf(),
        source,
    })
}

fn remote_error(blob: &BlobRef, source: StorageError) -> StowageError {
    StowageError::Transfer(TransferError::Remote {
        container: blob.container.name().to_string(),
        blob: blob.name.clone(),
        source,
    })
}
