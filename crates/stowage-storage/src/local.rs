use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

use stowage_core::error::StorageError;
use stowage_core::types::{BlobItem, BlobPage, ContainerRef, ContinuationToken, PublicAccess};

use crate::provider::StorageBackend;

const DELIMITER: char = '/';
const STAGING_DIR: &str = ".staging";
const MAX_BLOB_NAME: usize = 1024;

/// Filesystem-based backend.
///
/// Layout under `base_path`:
/// - `<container>/<blob path>` holds blob content
/// - `<container>.access` holds the container's public access level
/// - `.staging/` holds in-flight writes until they are renamed into place
///
/// Container names never contain `.`, so none of these collide.
///
/// Blob names map onto real directories, so `a` and `a/b` cannot both exist
/// in one container. Writing one while the other is present is rejected.
pub struct LocalBackend {
    base_path: PathBuf,
    page_size: usize,
    name: String,
}

impl LocalBackend {
    pub fn new(base_path: &Path, name: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(base_path.join(STAGING_DIR))?;
        Ok(Self {
            base_path: base_path.to_path_buf(),
            page_size: 5000,
            name: name.to_string(),
        })
    }

    /// Limit the number of entries returned per listing segment.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Current public access level recorded for `container`.
    pub fn permissions(&self, container: &ContainerRef) -> Result<PublicAccess, StorageError> {
        let path = self.access_path(container);
        if !path.exists() {
            return Ok(PublicAccess::None);
        }
        std::fs::read_to_string(&path)?.parse()
    }

    fn container_path(&self, container: &ContainerRef) -> PathBuf {
        self.base_path.join(container.name())
    }

    fn access_path(&self, container: &ContainerRef) -> PathBuf {
        self.base_path.join(format!("{}.access", container.name()))
    }

    fn existing_container(&self, container: &ContainerRef) -> Result<PathBuf, StorageError> {
        let path = self.container_path(container);
        if !path.is_dir() {
            return Err(StorageError::NotFound(format!(
                "container {}",
                container.name()
            )));
        }
        Ok(path)
    }

    fn blob_path(&self, container: &ContainerRef, blob: &str) -> Result<PathBuf, StorageError> {
        validate_blob_name(blob)?;
        let mut path = self.existing_container(container)?;
        for part in blob.split(DELIMITER) {
            path.push(part);
        }
        Ok(path)
    }

    /// Top-level listing entries in key order, with nested keys folded into
    /// their first-level directory marker.
    fn entries(&self, root: &Path) -> Result<Vec<BlobItem>, StorageError> {
        let mut keys = Vec::new();
        collect_keys(root, root, &mut keys)?;
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        let mut entries: Vec<BlobItem> = Vec::with_capacity(keys.len());
        for (key, size) in keys {
            match key.find(DELIMITER) {
                Some(pos) => {
                    let prefix = &key[..=pos];
                    if entries.last().map(BlobItem::name) != Some(prefix) {
                        entries.push(BlobItem::Directory {
                            prefix: prefix.to_string(),
                        });
                    }
                }
                None => {
                    let content_type = mime_guess::from_path(&key)
                        .first()
                        .map(|m| m.essence_str().to_string());
                    entries.push(BlobItem::Blob {
                        name: key,
                        size,
                        content_type,
                    });
                }
            }
        }
        Ok(entries)
    }
}

fn validate_blob_name(blob: &str) -> Result<(), StorageError> {
    if blob.is_empty() || blob.len() > MAX_BLOB_NAME {
        return Err(StorageError::Rejected(format!(
            "blob name must be 1-{MAX_BLOB_NAME} bytes"
        )));
    }
    let bad_part = blob
        .split(DELIMITER)
        .any(|part| part.is_empty() || part == "." || part == ".." || part.contains('\\'));
    if bad_part {
        return Err(StorageError::Rejected(format!("invalid blob name: {blob}")));
    }
    Ok(())
}

fn collect_keys(root: &Path, dir: &Path, out: &mut Vec<(String, u64)>) -> Result<(), StorageError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_keys(root, &path, out)?;
        } else if file_type.is_file() {
            let rel = path
                .strip_prefix(root)
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((key, entry.metadata()?.len()));
        }
    }
    Ok(())
}

/// Reject `blob` if a prefix of it is an existing blob, or if it names an
/// existing virtual directory.
fn check_no_collision(root: &Path, blob: &str) -> Result<(), StorageError> {
    let mut path = root.to_path_buf();
    let mut parts = blob.split(DELIMITER).peekable();
    let mut prefix = String::new();
    while let Some(part) = parts.next() {
        path.push(part);
        if !prefix.is_empty() {
            prefix.push(DELIMITER);
        }
        prefix.push_str(part);

        if parts.peek().is_some() {
            if path.is_file() {
                return Err(StorageError::Rejected(format!(
                    "blob name {blob} would nest under existing blob {prefix}"
                )));
            }
        } else if path.is_dir() {
            return Err(StorageError::Rejected(format!(
                "blob name {blob} is already a virtual directory"
            )));
        }
    }
    Ok(())
}

fn not_found_as(err: std::io::Error, what: String) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(what)
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn create_container_if_absent(
        &self,
        container: &ContainerRef,
    ) -> Result<(), StorageError> {
        let path = self.container_path(container);
        if path.is_dir() {
            tracing::debug!(container = container.name(), "Container already exists");
            return Ok(());
        }
        std::fs::create_dir_all(&path)?;
        tracing::debug!(container = container.name(), "Created container directory");
        Ok(())
    }

    async fn set_container_permissions(
        &self,
        container: &ContainerRef,
        access: PublicAccess,
    ) -> Result<(), StorageError> {
        self.existing_container(container)?;
        std::fs::write(self.access_path(container), access.to_string())?;
        Ok(())
    }

    async fn list_blobs_segment(
        &self,
        container: &ContainerRef,
        token: Option<ContinuationToken>,
    ) -> Result<BlobPage, StorageError> {
        let root = self.existing_container(container)?;
        let entries = self.entries(&root)?;

        let start = match &token {
            Some(after) => entries.partition_point(|e| e.name() <= after.as_str()),
            None => 0,
        };
        let end = (start + self.page_size).min(entries.len());
        let items = entries[start..end].to_vec();

        if end < entries.len() {
            let last = items
                .last()
                .map(|e| e.name().to_string())
                .unwrap_or_default();
            Ok(BlobPage::more(items, ContinuationToken::new(last)))
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
        let path = self.blob_path(container, blob)?;
        check_no_collision(&self.container_path(container), blob)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut staged = tempfile::NamedTempFile::new_in(self.base_path.join(STAGING_DIR))?;
        staged.write_all(&data)?;
        staged.flush()?;
        staged.persist(&path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }

    async fn get_blob(
        &self,
        container: &ContainerRef,
        blob: &str,
    ) -> Result<Vec<u8>, StorageError> {
        let path = self.blob_path(container, blob)?;
        if path.is_dir() {
            return Err(StorageError::NotFound(format!("{container}/{blob}")));
        }
        std::fs::read(&path).map_err(|e| not_found_as(e, format!("{container}/{blob}")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn backend_with_container(tmp: &TempDir) -> (LocalBackend, ContainerRef) {
        let backend = LocalBackend::new(tmp.path(), "test-local").unwrap();
        let container = ContainerRef::new("quickstart").unwrap();
        backend.create_container_if_absent(&container).await.unwrap();
        (backend, container)
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;
        backend.put_blob(&container, "keep.txt", b"x".to_vec()).await.unwrap();

        backend.create_container_if_absent(&container).await.unwrap();
        let data = backend.get_blob(&container, "keep.txt").await.unwrap();
        assert_eq!(data, b"x");
    }

    #[tokio::test]
    async fn permissions_overwrite() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;
        assert_eq!(backend.permissions(&container).unwrap(), PublicAccess::None);

        backend
            .set_container_permissions(&container, PublicAccess::Container)
            .await
            .unwrap();
        backend
            .set_container_permissions(&container, PublicAccess::Blob)
            .await
            .unwrap();
        assert_eq!(backend.permissions(&container).unwrap(), PublicAccess::Blob);
    }

    #[tokio::test]
    async fn permissions_on_missing_container_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path(), "test-local").unwrap();
        let container = ContainerRef::new("missing").unwrap();
        let err = backend
            .set_container_permissions(&container, PublicAccess::Blob)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_get_overwrites() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;

        backend
            .put_blob(&container, "docs/report.txt", b"first".to_vec())
            .await
            .unwrap();
        backend
            .put_blob(&container, "docs/report.txt", b"second".to_vec())
            .await
            .unwrap();
        let data = backend.get_blob(&container, "docs/report.txt").await.unwrap();
        assert_eq!(data, b"second");
    }

    #[tokio::test]
    async fn get_missing_blob_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;
        let err = backend.get_blob(&container, "nope.bin").await.unwrap_err();
        assert!(err.is_not_found());

        backend.put_blob(&container, "dir/a.bin", vec![1]).await.unwrap();
        let err = backend.get_blob(&container, "dir").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_into_missing_container_fails() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path(), "test-local").unwrap();
        let container = ContainerRef::new("missing").unwrap();
        let err = backend.put_blob(&container, "a", vec![]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rejects_escaping_blob_names() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;
        for name in ["", "../escape", "a//b", "/abs", "a/./b", "trailing/"] {
            let err = backend.put_blob(&container, name, vec![]).await.unwrap_err();
            assert!(matches!(err, StorageError::Rejected(_)), "{name:?}");
        }
    }

    #[tokio::test]
    async fn file_directory_name_clash_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;

        backend.put_blob(&container, "a", b"file".to_vec()).await.unwrap();
        let err = backend
            .put_blob(&container, "a/b", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected(ref msg) if msg.contains("existing blob a")));

        backend.put_blob(&container, "d/x", vec![1]).await.unwrap();
        let err = backend.put_blob(&container, "d", vec![2]).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));

        assert_eq!(backend.get_blob(&container, "a").await.unwrap(), b"file");
        assert_eq!(backend.get_blob(&container, "d/x").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn listing_folds_directories_and_pages() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;
        let backend = backend.with_page_size(2);

        for name in ["b.txt", "a.txt", "logs/1.log", "logs/2.log", "z.png"] {
            backend.put_blob(&container, name, vec![0; 3]).await.unwrap();
        }

        let first = backend.list_blobs_segment(&container, None).await.unwrap();
        let names: Vec<_> = first.items.iter().map(BlobItem::name).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        let token = first.continuation.expect("more pages");

        let second = backend
            .list_blobs_segment(&container, Some(token))
            .await
            .unwrap();
        assert_eq!(
            second.items,
            vec![
                BlobItem::Directory {
                    prefix: "logs/".to_string()
                },
                BlobItem::Blob {
                    name: "z.png".to_string(),
                    size: 3,
                    content_type: Some("image/png".to_string()),
                },
            ]
        );
        assert!(second.continuation.is_none());
    }

    #[tokio::test]
    async fn listing_empty_container() {
        let tmp = TempDir::new().unwrap();
        let (backend, container) = backend_with_container(&tmp).await;
        let page = backend.list_blobs_segment(&container, None).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.continuation.is_none());
    }

    #[tokio::test]
    async fn listing_missing_container_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path(), "test-local").unwrap();
        let container = ContainerRef::new("missing").unwrap();
        let err = backend
            .list_blobs_segment(&container, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
