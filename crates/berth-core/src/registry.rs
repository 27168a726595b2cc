//! Application version registration and the version naming scheme.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;
use crate::provider::{CreateVersionRequest, PlatformApi};

/// Extension used for uploaded artifact keys.
pub const ARTIFACT_EXTENSION: &str = "zip";

/// A generated version label: `{application}-{14-digit UTC timestamp}`.
///
/// Derived once per invocation and threaded through every call that needs
/// it, so a single run's upload, registration and environment pointer all
/// agree. Uniqueness relies on one-second timestamp granularity; two
/// invocations within the same second collide, so deployments to the same
/// application must be serialized externally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionLabel(String);

impl VersionLabel {
    /// Derive the label for an application at an explicit instant.
    pub fn derive(application: &str, at: DateTime<Utc>) -> Self {
        VersionLabel(format!("{}-{}", application, at.format("%Y%m%d%H%M%S")))
    }

    /// Derive the label for an application at the current instant.
    pub fn now(application: &str) -> Self {
        Self::derive(application, Utc::now())
    }

    /// Wrap a label supplied by the caller (cleanup paths).
    pub fn from_raw(label: impl Into<String>) -> Self {
        VersionLabel(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the artifact object backing this version.
    pub fn artifact_key(&self) -> String {
        format!("{}.{}", self.0, ARTIFACT_EXTENSION)
    }
}

impl std::fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registers uploaded artifacts as deployable versions.
pub struct VersionRegistry {
    platform: Arc<dyn PlatformApi>,
    application: String,
    bucket: String,
}

impl VersionRegistry {
    pub fn new(platform: Arc<dyn PlatformApi>, application: &str, bucket: &str) -> Self {
        VersionRegistry {
            platform,
            application: application.to_string(),
            bucket: bucket.to_string(),
        }
    }

    /// Register the uploaded object under `label`, creating the parent
    /// application if it does not exist yet. Re-registering the same
    /// label is idempotent at the provider; distinct labels never collide.
    pub async fn register(&self, label: &VersionLabel, description: &str) -> Result<()> {
        let request = CreateVersionRequest {
            application: self.application.clone(),
            version_label: label.as_str().to_string(),
            description: description.to_string(),
            bucket: self.bucket.clone(),
            key: label.artifact_key(),
            auto_create_application: true,
        };
        info!(label = %label, key = %request.key, "registering application version");
        self.platform.create_application_version(&request).await
    }

    /// Delete a registered version together with its backing artifact.
    /// Cleanup path only; the main deploy path never deletes.
    pub async fn delete(&self, label: &VersionLabel) -> Result<()> {
        info!(label = %label, "deleting application version");
        self.platform
            .delete_application_version(&self.application, label.as_str(), true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn label_format_is_app_dash_timestamp14() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let label = VersionLabel::derive("hello", at);
        assert_eq!(label.as_str(), "hello-20240102030405");
    }

    #[test]
    fn artifact_key_appends_the_extension() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let label = VersionLabel::derive("hello", at);
        assert_eq!(label.artifact_key(), "hello-20240102030405.zip");
    }
}
