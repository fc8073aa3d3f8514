/// Integration tests for the Azure Blob Storage backend.
///
/// These tests require real cloud credentials and are skipped if env vars are not set.
///
/// Run with:
///   AZURE_STORAGE_ACCOUNT=stowagetest \
///   AZURE_STORAGE_KEY="..." \
///   cargo test -p stowage-storage --test cloud_providers -- --nocapture
use stowage_storage::provider::StorageBackend;

#[cfg(feature = "azure")]
mod azure_tests {
    use super::*;
    use stowage_core::types::{BlobItem, ContainerRef, PublicAccess};
    use stowage_storage::azure::AzureBackend;

    fn get_azure_backend() -> Option<AzureBackend> {
        let account = std::env::var("AZURE_STORAGE_ACCOUNT").ok()?;
        let key = std::env::var("AZURE_STORAGE_KEY").ok()?;
        Some(AzureBackend::new(&account, &key, "azure-test"))
    }

    fn container() -> ContainerRef {
        ContainerRef::new("stowage-integration").unwrap()
    }

    #[tokio::test]
    async fn azure_create_is_idempotent() {
        let Some(backend) = get_azure_backend() else {
            eprintln!("SKIP: AZURE_STORAGE_ACCOUNT not set");
            return;
        };
        let container = container();

        backend
            .create_container_if_absent(&container)
            .await
            .expect("first create failed");
        backend
            .create_container_if_absent(&container)
            .await
            .expect("second create failed");
        backend
            .set_container_permissions(&container, PublicAccess::Blob)
            .await
            .expect("set permissions failed");
        println!("OK: Azure container provisioned twice");
    }

    #[tokio::test]
    async fn azure_upload_list_download() {
        let Some(backend) = get_azure_backend() else {
            eprintln!("SKIP: AZURE_STORAGE_ACCOUNT not set");
            return;
        };
        let container = container();
        backend
            .create_container_if_absent(&container)
            .await
            .expect("create failed");

        let blob = "stowage/test/integration-blob.txt";
        let data = b"Hello from Stowage integration test - Azure!";

        // Upload
        backend
            .put_blob(&container, blob, data.to_vec())
            .await
            .expect("upload failed");
        println!("OK: Azure upload");

        // List (hierarchical: the blob sits under the `stowage/` marker)
        let mut token = None;
        let mut items = Vec::new();
        loop {
            let page = backend
                .list_blobs_segment(&container, token)
                .await
                .expect("list failed");
            items.extend(page.items);
            match page.continuation {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert!(items.iter().any(|i| matches!(
            i,
            BlobItem::Directory { prefix } if prefix == "stowage/"
        )));
        println!("OK: Azure listing has {} items", items.len());

        // Download
        let downloaded = backend
            .get_blob(&container, blob)
            .await
            .expect("download failed");
        assert_eq!(downloaded, data);
        println!("OK: Azure download matches");

        // Missing blob
        let err = backend
            .get_blob(&container, "stowage/test/does-not-exist")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        println!("OK: Azure missing blob reports not found");
    }
}
