#[cfg(feature = "azure")]
mod inner {
    use async_trait::async_trait;
    use azure_core::StatusCode;
    use azure_core::error::ErrorKind;
    use azure_storage::{CloudLocation, StorageCredentials};
    use azure_storage_blobs::container::operations::{BlobItem as AzureBlobItem, ListBlobsResponse};
    use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder, PublicAccess as AzureAccess};
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use stowage_core::config::ConnectionDescriptor;
    use stowage_core::error::StorageError;
    use stowage_core::types::{BlobItem, BlobPage, ContainerRef, ContinuationToken, PublicAccess};

    use crate::provider::StorageBackend;

    type BlobPager = azure_core::Pageable<ListBlobsResponse, azure_core::Error>;

    /// Idle time after which a parked listing cursor is dropped.
    const CURSOR_TTL: Duration = Duration::from_secs(300);
    /// Parked cursors kept per backend before the oldest is dropped.
    const MAX_CURSORS: usize = 256;

    /// Parked values keyed by token, bounded by age and count.
    struct CursorTable<T> {
        entries: HashMap<String, (Instant, T)>,
        ttl: Duration,
        capacity: usize,
    }

    impl<T> CursorTable<T> {
        fn new(ttl: Duration, capacity: usize) -> Self {
            Self {
                entries: HashMap::new(),
                ttl,
                capacity: capacity.max(1),
            }
        }

        fn len(&self) -> usize {
            self.entries.len()
        }

        /// Drop every entry parked at or before `now - ttl`. Returns how many went.
        fn evict_expired(&mut self, now: Instant) -> usize {
            let before = self.entries.len();
            let ttl = self.ttl;
            self.entries
                .retain(|_, (parked, _)| now.saturating_duration_since(*parked) < ttl);
            before - self.entries.len()
        }

        fn park(&mut self, key: String, value: T, now: Instant) {
            self.evict_expired(now);
            while self.entries.len() >= self.capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, (parked, _))| *parked)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        self.entries.remove(&key);
                    }
                    None => break,
                }
            }
            self.entries.insert(key, (now, value));
        }

        fn take(&mut self, key: &str, now: Instant) -> Option<T> {
            self.evict_expired(now);
            self.entries.remove(key).map(|(_, value)| value)
        }
    }

    /// Azure Blob Storage backend.
    ///
    /// The SDK drives pagination through a stream that threads markers
    /// internally. To hand explicit tokens back to callers, each in-flight
    /// stream is parked under a fresh token until the next segment is requested.
    /// Tokens are therefore only meaningful to the backend instance that issued
    /// them, and expire if left idle.
    pub struct AzureBackend {
        service: BlobServiceClient,
        account: String,
        cursors: Mutex<CursorTable<BlobPager>>,
        name: String,
    }

    impl fmt::Debug for AzureBackend {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("AzureBackend")
                .field("account", &self.account)
                .field("name", &self.name)
                .finish()
        }
    }

    impl AzureBackend {
        /// Create from storage account name + access key.
        pub fn new(account: &str, access_key: &str, name: &str) -> Self {
            let credentials = StorageCredentials::access_key(account, access_key.to_string());
            let service = ClientBuilder::new(account, credentials).blob_service_client();
            Self::from_service(service, account, name)
        }

        /// Create using the emulator (Azurite).
        pub fn emulator(name: &str) -> Self {
            let service = ClientBuilder::emulator().blob_service_client();
            Self::from_service(service, "devstoreaccount1", name)
        }

        /// Create from a parsed connection descriptor.
        pub fn from_descriptor(
            descriptor: &ConnectionDescriptor,
            name: &str,
        ) -> Result<Self, StorageError> {
            let (account, credentials, endpoint) = match descriptor {
                ConnectionDescriptor::AccountKey {
                    account,
                    key,
                    endpoint,
                } => (
                    account,
                    StorageCredentials::access_key(account.clone(), key.clone()),
                    endpoint,
                ),
                ConnectionDescriptor::Sas {
                    account,
                    sas,
                    endpoint,
                } => {
                    let credentials = StorageCredentials::sas_token(sas.as_str())
                        .map_err(|e| StorageError::Rejected(format!("invalid SAS token: {e}")))?;
                    (account, credentials, endpoint)
                }
                ConnectionDescriptor::Emulator => return Ok(Self::emulator(name)),
                ConnectionDescriptor::Local { .. } => {
                    return Err(StorageError::Rejected(
                        "local storage descriptor passed to the Azure backend".to_string(),
                    ));
                }
            };

            let builder = match endpoint.custom_uri(account) {
                Some(uri) => ClientBuilder::with_location(
                    CloudLocation::Custom {
                        account: account.clone(),
                        uri,
                    },
                    credentials,
                ),
                None => ClientBuilder::new(account.clone(), credentials),
            };
            Ok(Self::from_service(
                builder.blob_service_client(),
                account,
                name,
            ))
        }

        fn from_service(service: BlobServiceClient, account: &str, name: &str) -> Self {
            Self {
                service,
                account: account.to_string(),
                cursors: Mutex::new(CursorTable::new(CURSOR_TTL, MAX_CURSORS)),
                name: name.to_string(),
            }
        }

        fn take_cursor(&self, token: &ContinuationToken) -> Result<BlobPager, StorageError> {
            let mut cursors = self
                .cursors
                .lock()
                .map_err(|_| StorageError::Transport("cursor table poisoned".to_string()))?;
            cursors.take(token.as_str(), Instant::now()).ok_or_else(|| {
                StorageError::Rejected("unknown or expired continuation token".to_string())
            })
        }

        fn park_cursor(&self, pager: BlobPager) -> Result<ContinuationToken, StorageError> {
            let key = uuid::Uuid::now_v7().to_string();
            let mut cursors = self
                .cursors
                .lock()
                .map_err(|_| StorageError::Transport("cursor table poisoned".to_string()))?;
            cursors.park(key.clone(), pager, Instant::now());
            tracing::trace!(parked = cursors.len(), "Parked listing cursor");
            Ok(ContinuationToken::new(key))
        }
    }

    fn to_azure_access(access: PublicAccess) -> AzureAccess {
        match access {
            PublicAccess::None => AzureAccess::None,
            PublicAccess::Blob => AzureAccess::Blob,
            PublicAccess::Container => AzureAccess::Container,
        }
    }

    fn convert_item(item: AzureBlobItem) -> BlobItem {
        match item {
            AzureBlobItem::Blob(blob) => BlobItem::Blob {
                content_type: Some(blob.properties.content_type).filter(|ct| !ct.is_empty()),
                size: blob.properties.content_length,
                name: blob.name,
            },
            AzureBlobItem::BlobPrefix(prefix) => BlobItem::Directory {
                prefix: prefix.name,
            },
        }
    }

    /// Only a 409 `ContainerAlreadyExists` counts as success on create.
    fn is_already_exists(err: &azure_core::Error) -> bool {
        match err.kind() {
            ErrorKind::HttpResponse {
                status: StatusCode::Conflict,
                error_code,
            } => error_code.as_deref() == Some("ContainerAlreadyExists"),
            _ => false,
        }
    }

    fn map_error(err: azure_core::Error, context: &str) -> StorageError {
        match err.kind() {
            ErrorKind::HttpResponse { status, error_code } => {
                let detail = format!(
                    "{context}: {}",
                    error_code.as_deref().unwrap_or("no error code")
                );
                match status {
                    StatusCode::NotFound => StorageError::NotFound(detail),
                    StatusCode::Conflict => StorageError::AlreadyExists(detail),
                    StatusCode::BadRequest | StatusCode::Unauthorized | StatusCode::Forbidden => {
                        StorageError::Rejected(detail)
                    }
                    _ => StorageError::Transport(format!("{detail} ({err})")),
                }
            }
            _ => StorageError::Transport(format!("{context}: {err}")),
        }
    }

    #[async_trait]
    impl StorageBackend for AzureBackend {
        async fn create_container_if_absent(
            &self,
            container: &ContainerRef,
        ) -> Result<(), StorageError> {
            match self.service.container_client(container.name()).create().await {
                Ok(_) => {
                    tracing::debug!(container = container.name(), "Created container");
                    Ok(())
                }
                Err(e) if is_already_exists(&e) => {
                    tracing::debug!(container = container.name(), "Container already exists");
                    Ok(())
                }
                Err(e) => Err(map_error(e, container.name())),
            }
        }

        async fn set_container_permissions(
            &self,
            container: &ContainerRef,
            access: PublicAccess,
        ) -> Result<(), StorageError> {
            self.service
                .container_client(container.name())
                .set_acl(to_azure_access(access))
                .await
                .map_err(|e| map_error(e, container.name()))?;
            Ok(())
        }

        async fn list_blobs_segment(
            &self,
            container: &ContainerRef,
            token: Option<ContinuationToken>,
        ) -> Result<BlobPage, StorageError> {
            let mut pager = match token {
                Some(token) => self.take_cursor(&token)?,
                None => self
                    .service
                    .container_client(container.name())
                    .list_blobs()
                    .delimiter(String::from("/"))
                    .into_stream(),
            };

            let response = match pager.next().await {
                Some(response) => response.map_err(|e| map_error(e, container.name()))?,
                None => return Ok(BlobPage::last(Vec::new())),
            };

            let has_more = response.next_marker.is_some();
            let items = response
                .blobs
                .items
                .into_iter()
                .map(convert_item)
                .collect();

            if has_more {
                Ok(BlobPage::more(items, self.park_cursor(pager)?))
            } else {
                Ok(BlobPage::last(items))
            }
        }

        async fn put_blob(
            &self,
            container: &ContainerRef,
            blob: &str,
            data: Vec<u8>,
        ) -> Result<(), StorageError> {
            self.service
                .container_client(container.name())
                .blob_client(blob)
                .put_block_blob(data)
                .await
                .map_err(|e| map_error(e, &format!("{container}/{blob}")))?;
            Ok(())
        }

        async fn get_blob(
            &self,
            container: &ContainerRef,
            blob: &str,
        ) -> Result<Vec<u8>, StorageError> {
            self.service
                .container_client(container.name())
                .blob_client(blob)
                .get_content()
                .await
                .map_err(|e| map_error(e, &format!("{container}/{blob}")))
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn conflict(code: Option<&str>) -> azure_core::Error {
            azure_core::Error::message(
                ErrorKind::HttpResponse {
                    status: StatusCode::Conflict,
                    error_code: code.map(str::to_string),
                },
                "conflict",
            )
        }

        #[test]
        fn only_container_already_exists_counts_as_created() {
            assert!(is_already_exists(&conflict(Some("ContainerAlreadyExists"))));
            assert!(!is_already_exists(&conflict(Some("ContainerBeingDeleted"))));
            assert!(!is_already_exists(&conflict(Some("LeaseIdMissing"))));
            assert!(!is_already_exists(&conflict(None)));
        }

        #[test]
        fn other_conflicts_map_to_already_exists_error() {
            let err = map_error(conflict(Some("ContainerBeingDeleted")), "quickstart");
            assert!(matches!(err, StorageError::AlreadyExists(_)));
        }

        #[test]
        fn cursor_take_is_single_use() {
            let now = Instant::now();
            let mut table = CursorTable::new(Duration::from_secs(60), 4);
            table.park("a".to_string(), 1, now);
            assert_eq!(table.take("a", now), Some(1));
            assert_eq!(table.take("a", now), None);
        }

        #[test]
        fn cursors_expire_after_ttl() {
            let start = Instant::now();
            let mut table = CursorTable::new(Duration::from_secs(60), 16);
            table.park("old".to_string(), 1, start);
            table.park("new".to_string(), 2, start + Duration::from_secs(30));

            let later = start + Duration::from_secs(61);
            assert_eq!(table.evict_expired(later), 1);
            assert_eq!(table.take("old", later), None);
            assert_eq!(table.take("new", later), Some(2));
        }

        #[test]
        fn abandoned_cursors_stay_bounded() {
            let start = Instant::now();
            let mut table = CursorTable::new(Duration::from_secs(3600), 3);
            for i in 0..10u64 {
                table.park(format!("cursor-{i}"), i, start + Duration::from_millis(i));
            }
            assert_eq!(table.len(), 3);

            let now = start + Duration::from_secs(1);
            assert_eq!(table.take("cursor-0", now), None);
            assert_eq!(table.take("cursor-6", now), None);
            assert_eq!(table.take("cursor-7", now), Some(7));
            assert_eq!(table.take("cursor-9", now), Some(9));
        }
    }
}

#[cfg(feature = "azure")]
pub use inner::AzureBackend;
