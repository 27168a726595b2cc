//! Artifact upload into the project's content bucket.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::provider::ObjectStore;
use crate::registry::VersionLabel;

/// Uploads build artifacts under deterministic keys.
pub struct ArtifactStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ArtifactStore {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        ArtifactStore {
            store,
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the content bucket only if it does not exist. Idempotent.
    pub async fn ensure_bucket(&self) -> Result<()> {
        if self.store.bucket_exists(&self.bucket).await? {
            debug!(bucket = %self.bucket, "bucket already exists");
            return Ok(());
        }
        info!(bucket = %self.bucket, "creating artifact bucket");
        self.store.create_bucket(&self.bucket).await
    }

    /// Upload artifact bytes under `{label}.{extension}`. Overwrites any
    /// existing object with the same key, which makes a retried upload of
    /// the same invocation safe.
    pub async fn upload(&self, label: &VersionLabel, body: Vec<u8>) -> Result<String> {
        let key = label.artifact_key();
        let digest = blake3::hash(&body);
        info!(
            bucket = %self.bucket,
            key = %key,
            bytes = body.len(),
            digest = %digest.to_hex(),
            "uploading artifact"
        );
        self.store.put_object(&self.bucket, &key, body).await?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Debug, PartialEq)]
    enum Call {
        Exists(String),
        Create(String),
        Put { bucket: String, key: String },
    }

    struct FakeStore {
        calls: Mutex<Vec<Call>>,
        exists: bool,
    }

    impl FakeStore {
        fn new(exists: bool) -> Self {
            FakeStore {
                calls: Mutex::new(Vec::new()),
                exists,
            }
        }
    }

    #[async_trait]
    impl super::ObjectStore for FakeStore {
        async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Exists(bucket.to_string()));
            Ok(self.exists)
        }

        async fn create_bucket(&self, bucket: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Create(bucket.to_string()));
            Ok(())
        }

        async fn put_object(&self, bucket: &str, key: &str, _body: Vec<u8>) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn ensure_bucket_is_a_noop_when_present() {
        let store = Arc::new(FakeStore::new(true));
        let artifacts = ArtifactStore::new(store.clone(), "content");

        artifacts.ensure_bucket().await.unwrap();

        let calls = store.calls.lock().unwrap();
        assert_eq!(*calls, vec![Call::Exists("content".to_string())]);
    }

    #[tokio::test]
    async fn ensure_bucket_creates_when_absent() {
        let store = Arc::new(FakeStore::new(false));
        let artifacts = ArtifactStore::new(store.clone(), "content");

        artifacts.ensure_bucket().await.unwrap();

        let calls = store.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                Call::Exists("content".to_string()),
                Call::Create("content".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn upload_key_matches_the_version_artifact_key() {
        let store = Arc::new(FakeStore::new(true));
        let artifacts = ArtifactStore::new(store.clone(), "content");
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let label = VersionLabel::derive("hello", at);

        let key = artifacts.upload(&label, b"bytes".to_vec()).await.unwrap();

        assert_eq!(key, label.artifact_key());
        let calls = store.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![Call::Put {
                bucket: "content".to_string(),
                key: "hello-20240102030405.zip".to_string(),
            }]
        );
    }
}
