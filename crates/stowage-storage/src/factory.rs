//! Factory for creating the storage backend a connection descriptor selects.

use std::sync::Arc;

use stowage_core::config::ConnectionDescriptor;
use stowage_core::error::StorageError;

use crate::local::LocalBackend;
use crate::provider::StorageBackend;

/// Options that only some backends honour.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Entries per listing segment for the filesystem backend.
    pub local_page_size: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            local_page_size: 5000,
        }
    }
}

/// Create a backend for `descriptor`.
///
/// Supported descriptors:
/// - `UseLocalStorage=true;LocalRoot=...` - filesystem backend
/// - account key, SAS or `UseDevelopmentStorage=true` - Azure Blob Storage
///   (compile with the `azure` feature)
pub fn create_backend(
    descriptor: &ConnectionDescriptor,
    options: &BackendOptions,
) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let label = descriptor.label();
    match descriptor {
        ConnectionDescriptor::Local { root } => {
            let backend =
                LocalBackend::new(root, &label)?.with_page_size(options.local_page_size);
            Ok(Arc::new(backend))
        }

        #[cfg(feature = "azure")]
        _ => Ok(Arc::new(crate::azure::AzureBackend::from_descriptor(
            descriptor, &label,
        )?)),

        #[cfg(not(feature = "azure"))]
        _ => Err(StorageError::Rejected(
            "azure feature not enabled. Recompile with --features azure".to_string(),
        )),
    }
}
