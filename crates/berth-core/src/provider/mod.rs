//! Provider boundary: the remote platform and object-storage APIs.
//!
//! Everything behind these traits is a thin I/O wrapper with no internal
//! state machine; the orchestration layers above only depend on the trait
//! surface, which is what the tests substitute with recording fakes.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OptionSetting;
use crate::error::Result;

pub use http::{HttpObjectStore, HttpPlatformApi, ProviderProfile};

/// Observed status of a remote environment.
///
/// Only `Ready` and `Terminated` are actionable for the orchestrator;
/// every other status means "not yet". Unknown provider statuses survive
/// deserialization as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EnvironmentStatus {
    Launching,
    Updating,
    Ready,
    Terminating,
    Terminated,
    #[serde(untagged)]
    Other(String),
}

impl EnvironmentStatus {
    /// A running environment is anything not yet terminated.
    pub fn is_running(&self) -> bool {
        !matches!(self, EnvironmentStatus::Terminated)
    }
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentStatus::Launching => write!(f, "Launching"),
            EnvironmentStatus::Updating => write!(f, "Updating"),
            EnvironmentStatus::Ready => write!(f, "Ready"),
            EnvironmentStatus::Terminating => write!(f, "Terminating"),
            EnvironmentStatus::Terminated => write!(f, "Terminated"),
            EnvironmentStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A provider-owned environment as observed through polling.
///
/// This crate never authors one of these; it only holds transient,
/// possibly-stale snapshots returned by describe calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEnvironment {
    pub environment_id: String,
    pub name: String,
    pub status: EnvironmentStatus,
    #[serde(default)]
    pub version_label: Option<String>,
    #[serde(default)]
    pub cname: Option<String>,
}

/// Request to create a new environment pointing at a registered version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentRequest {
    pub application: String,
    pub name: String,
    pub description: String,
    pub cname_prefix: String,
    pub platform: String,
    pub option_settings: Vec<OptionSetting>,
    pub version_label: String,
}

/// Request to update an existing environment.
///
/// The platform accepts settings changes and version changes as separate
/// requests; exactly one of the two optional fields is set per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnvironmentRequest {
    pub application: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_settings: Option<Vec<OptionSetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
}

impl UpdateEnvironmentRequest {
    /// Settings-only update; the version pointer is left untouched.
    pub fn settings(application: &str, name: &str, options: Vec<OptionSetting>) -> Self {
        UpdateEnvironmentRequest {
            application: application.to_string(),
            name: name.to_string(),
            option_settings: Some(options),
            version_label: None,
        }
    }

    /// Version-only update; settings are left untouched.
    pub fn version(application: &str, name: &str, label: &str) -> Self {
        UpdateEnvironmentRequest {
            application: application.to_string(),
            name: name.to_string(),
            option_settings: None,
            version_label: Some(label.to_string()),
        }
    }
}

/// Request to register an uploaded artifact as a named version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    pub application: String,
    pub version_label: String,
    pub description: String,
    pub bucket: String,
    pub key: String,
    /// Create the parent application if it does not exist yet
    pub auto_create_application: bool,
}

/// Remote platform API: environments and application versions.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// List all environments under an application. Always a fresh query.
    async fn describe_environments(&self, application: &str) -> Result<Vec<RuntimeEnvironment>>;

    /// Submit an environment creation request. Fire-and-forget: the call
    /// returns once the platform accepts the request, not once the
    /// environment is Ready.
    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> Result<()>;

    /// Submit an environment update request (settings or version).
    async fn update_environment(&self, request: &UpdateEnvironmentRequest) -> Result<()>;

    /// Submit a termination request for an environment by id.
    async fn terminate_environment(&self, environment_id: &str) -> Result<()>;

    /// Register an uploaded object as a deployable version.
    async fn create_application_version(&self, request: &CreateVersionRequest) -> Result<()>;

    /// Delete a registered version, cascading to the backing object.
    async fn delete_application_version(
        &self,
        application: &str,
        version_label: &str,
        delete_source: bool,
    ) -> Result<()>;
}

/// Object storage API: buckets and artifact objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether the bucket already exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create the bucket.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Store an object under a key, overwriting any previous body.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}
