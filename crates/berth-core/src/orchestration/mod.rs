//! Deployment orchestration: the single entry point per invocation.
//!
//! Resolves configuration once, derives the version label once, and
//! threads that label through the upload, the registration and the
//! environment pointer so every step of one run agrees on the version.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use crate::artifact::ArtifactStore;
use crate::bundle::bundle_artifact;
use crate::config::ProjectConfig;
use crate::directory::EnvironmentDirectory;
use crate::lifecycle::LifecycleController;
use crate::poll::PollConfig;
use crate::provider::{ObjectStore, PlatformApi, ProviderProfile, RuntimeEnvironment};
use crate::registry::{VersionLabel, VersionRegistry};

pub use crate::lifecycle::DeployOutcome;

/// Result of uploading one artifact.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub key: String,
    pub bytes: usize,
    pub digest: String,
}

/// Result of one deploy invocation.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub environment: String,
    pub label: String,
    pub outcome: DeployOutcome,
    pub artifact: UploadReport,
}

/// Orchestrates one deployment invocation against one project.
pub struct Deployer {
    config: ProjectConfig,
    version: VersionLabel,
    artifacts: ArtifactStore,
    registry: VersionRegistry,
    directory: EnvironmentDirectory,
    lifecycle: LifecycleController,
}

impl Deployer {
    /// Build the orchestrator from resolved configuration, constructing
    /// the provider clients through the profile selected for this config.
    pub fn new(config: ProjectConfig) -> anyhow::Result<Self> {
        let profile = ProviderProfile::from_config(&config.project, config.credentials.clone())
            .context("failed to resolve provider profile")?;
        let platform = profile.platform_api()?;
        let store = profile.object_store()?;
        let version = VersionLabel::now(&config.project.application);
        Ok(Self::with_clients(config, platform, store, version))
    }

    /// Wire the orchestrator over explicit provider clients. This is the
    /// seam the tests use to substitute recording fakes.
    pub fn with_clients(
        config: ProjectConfig,
        platform: Arc<dyn PlatformApi>,
        store: Arc<dyn ObjectStore>,
        version: VersionLabel,
    ) -> Self {
        let application = config.project.application.clone();
        let bucket = config.project.bucket.clone();
        let poll = PollConfig::new(
            Duration::from_secs(config.project.poll_interval_secs),
            config.project.poll_timeout_secs.map(Duration::from_secs),
        );

        Deployer {
            artifacts: ArtifactStore::new(store, &bucket),
            registry: VersionRegistry::new(platform.clone(), &application, &bucket),
            directory: EnvironmentDirectory::new(platform.clone(), &application),
            lifecycle: LifecycleController::new(
                platform,
                &application,
                poll,
                config.project.wait_on_create,
            ),
            version,
            config,
        }
    }

    /// Version label derived for this invocation.
    pub fn version(&self) -> &VersionLabel {
        &self.version
    }

    /// Bundle and upload the artifact at `path` under this invocation's
    /// version key, creating the content bucket if needed.
    pub async fn upload_artifact(&self, path: &Path) -> anyhow::Result<UploadReport> {
        self.artifacts
            .ensure_bucket()
            .await
            .context("failed to ensure artifact bucket")?;

        let bundle = bundle_artifact(path)
            .with_context(|| format!("failed to bundle artifact at {}", path.display()))?;
        let bytes = bundle.bytes.len();
        let key = self
            .artifacts
            .upload(&self.version, bundle.bytes)
            .await
            .context("artifact upload failed")?;

        Ok(UploadReport {
            key,
            bytes,
            digest: bundle.digest,
        })
    }

    /// Register the uploaded artifact as this invocation's version.
    pub async fn create_version(&self) -> anyhow::Result<VersionLabel> {
        let description = source_revision()
            .map(|sha| format!("deployed from {}", sha))
            .unwrap_or_default();
        self.registry
            .register(&self.version, &description)
            .await
            .context("failed to register application version")?;
        Ok(self.version.clone())
    }

    /// Delete a previously registered version and its backing artifact.
    pub async fn delete_version(&self, label: &str) -> anyhow::Result<()> {
        self.registry
            .delete(&VersionLabel::from_raw(label))
            .await
            .with_context(|| format!("failed to delete version '{}'", label))
    }

    /// Run the full pipeline for one environment: upload, register, then
    /// create or update the named environment.
    pub async fn deploy_environment(
        &self,
        name: &str,
        artifact: &Path,
        progress: &mut dyn FnMut(u32),
    ) -> anyhow::Result<DeployReport> {
        let spec = self.config.environment(name)?;

        info!(environment = name, label = %self.version, "starting deployment");
        let upload = self.upload_artifact(artifact).await?;
        self.create_version().await?;

        let outcome = self
            .lifecycle
            .deploy(name, spec, &self.version, progress)
            .await?;
        debug!(environment = name, ?outcome, "deployment submitted");

        Ok(DeployReport {
            environment: name.to_string(),
            label: self.version.as_str().to_string(),
            outcome,
            artifact: upload,
        })
    }

    /// Terminate the running environment with this name, if any. Returns
    /// whether a termination request was issued.
    pub async fn terminate_environment(&self, name: &str) -> anyhow::Result<bool> {
        self.lifecycle.terminate(name).await
    }

    /// Fresh listing of all environments under the application.
    pub async fn describe_environments(&self) -> anyhow::Result<Vec<RuntimeEnvironment>> {
        self.directory
            .list()
            .await
            .context("failed to list environments")
    }
}

/// Short commit id of HEAD when invoked inside a git repository.
fn source_revision() -> Option<String> {
    let repo = git2::Repository::discover(".").ok()?;
    let head = repo.head().ok()?.peel_to_commit().ok()?;
    let short = head.as_object().short_id().ok()?;
    short.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use crate::config::{Credentials, EnvironmentSpec, ProjectSection};
    use crate::error::Result;
    use crate::provider::{
        CreateEnvironmentRequest, CreateVersionRequest, EnvironmentStatus,
        UpdateEnvironmentRequest,
    };

    /// Shared journal across both provider fakes so cross-boundary call
    /// order can be asserted.
    type Journal = Arc<Mutex<Vec<String>>>;

    struct JournalingStore {
        journal: Journal,
    }

    #[async_trait]
    impl ObjectStore for JournalingStore {
        async fn bucket_exists(&self, _: &str) -> Result<bool> {
            self.journal.lock().unwrap().push("bucket_exists".into());
            Ok(true)
        }

        async fn create_bucket(&self, _: &str) -> Result<()> {
            self.journal.lock().unwrap().push("create_bucket".into());
            Ok(())
        }

        async fn put_object(&self, _: &str, key: &str, _: Vec<u8>) -> Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("put_object:{}", key));
            Ok(())
        }
    }

    struct JournalingPlatform {
        journal: Journal,
        environments: Vec<RuntimeEnvironment>,
    }

    #[async_trait]
    impl PlatformApi for JournalingPlatform {
        async fn describe_environments(&self, _: &str) -> Result<Vec<RuntimeEnvironment>> {
            self.journal.lock().unwrap().push("describe".into());
            Ok(self.environments.clone())
        }

        async fn create_environment(&self, request: &CreateEnvironmentRequest) -> Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("create_environment:{}", request.version_label));
            Ok(())
        }

        async fn update_environment(&self, _: &UpdateEnvironmentRequest) -> Result<()> {
            self.journal.lock().unwrap().push("update_environment".into());
            Ok(())
        }

        async fn terminate_environment(&self, _: &str) -> Result<()> {
            self.journal.lock().unwrap().push("terminate".into());
            Ok(())
        }

        async fn create_application_version(&self, request: &CreateVersionRequest) -> Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("register:{}", request.key));
            Ok(())
        }

        async fn delete_application_version(&self, _: &str, label: &str, _: bool) -> Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("delete_version:{}", label));
            Ok(())
        }
    }

    fn config() -> ProjectConfig {
        let mut environments = BTreeMap::new();
        environments.insert(
            "production".to_string(),
            EnvironmentSpec {
                description: "prod".to_string(),
                cname_prefix: "hello-prod".to_string(),
                platform: "docker".to_string(),
                options: BTreeMap::new(),
            },
        );
        ProjectConfig {
            project: ProjectSection {
                application: "hello".to_string(),
                region: "eu-central".to_string(),
                endpoint: None,
                bucket: "hello-artifacts".to_string(),
                artifact: None,
                encrypted_uploads: false,
                wait_on_create: false,
                poll_interval_secs: 1,
                poll_timeout_secs: None,
            },
            environments,
            credentials: Credentials::default(),
        }
    }

    fn deployer(environments: Vec<RuntimeEnvironment>) -> (Deployer, Journal) {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let platform = Arc::new(JournalingPlatform {
            journal: journal.clone(),
            environments,
        });
        let store = Arc::new(JournalingStore {
            journal: journal.clone(),
        });
        let version = VersionLabel::from_raw("hello-20240102030405");
        (
            Deployer::with_clients(config(), platform, store, version),
            journal,
        )
    }

    fn artifact_file() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"bundle").unwrap();
        file
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_flows_upload_register_then_lifecycle() {
        let (deployer, journal) = deployer(Vec::new());
        let artifact = artifact_file();

        let report = deployer
            .deploy_environment("production", artifact.path(), &mut |_| {})
            .await
            .unwrap();

        assert_eq!(report.outcome, DeployOutcome::Created);
        assert_eq!(report.label, "hello-20240102030405");

        let calls = journal.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "bucket_exists",
                "put_object:hello-20240102030405.zip",
                "register:hello-20240102030405.zip",
                "describe",
                "create_environment:hello-20240102030405",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn upload_and_register_reference_the_identical_key() {
        let (deployer, journal) = deployer(Vec::new());
        let artifact = artifact_file();

        let upload = deployer.upload_artifact(artifact.path()).await.unwrap();
        deployer.create_version().await.unwrap();

        let calls = journal.lock().unwrap().clone();
        let uploaded = calls
            .iter()
            .find_map(|c| c.strip_prefix("put_object:"))
            .unwrap()
            .to_string();
        let registered = calls
            .iter()
            .find_map(|c| c.strip_prefix("register:"))
            .unwrap()
            .to_string();
        assert_eq!(uploaded, registered);
        assert_eq!(upload.key, uploaded);
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_to_unknown_environment_fails_before_any_remote_call() {
        let (deployer, journal) = deployer(Vec::new());
        let artifact = artifact_file();

        let err = deployer
            .deploy_environment("staging", artifact.path(), &mut |_| {})
            .await
            .unwrap_err();

        assert!(err.to_string().contains("staging"));
        assert!(journal.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_to_running_environment_takes_the_update_path() {
        let running = RuntimeEnvironment {
            environment_id: "e-1".to_string(),
            name: "production".to_string(),
            status: EnvironmentStatus::Ready,
            version_label: Some("hello-20230101000000".to_string()),
            cname: None,
        };
        let (deployer, journal) = deployer(vec![running]);
        let artifact = artifact_file();

        let report = deployer
            .deploy_environment("production", artifact.path(), &mut |_| {})
            .await
            .unwrap();

        assert_eq!(report.outcome, DeployOutcome::Updated);
        let calls = journal.lock().unwrap().clone();
        let updates = calls.iter().filter(|c| *c == "update_environment").count();
        assert_eq!(updates, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_version_cascades_through_the_registry() {
        let (deployer, journal) = deployer(Vec::new());

        deployer.delete_version("hello-20230101000000").await.unwrap();

        let calls = journal.lock().unwrap().clone();
        assert_eq!(calls, vec!["delete_version:hello-20230101000000"]);
    }
}
