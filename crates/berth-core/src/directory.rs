//! Environment directory: listing and filtering remote environments.
//!
//! Every lookup is a fresh remote query; directory results are transient
//! snapshots, never cached.

use std::sync::Arc;

use crate::error::Result;
use crate::provider::{PlatformApi, RuntimeEnvironment};

/// Read-only view over the environments of one application.
pub struct EnvironmentDirectory {
    platform: Arc<dyn PlatformApi>,
    application: String,
}

impl EnvironmentDirectory {
    pub fn new(platform: Arc<dyn PlatformApi>, application: &str) -> Self {
        EnvironmentDirectory {
            platform,
            application: application.to_string(),
        }
    }

    /// All environments under the application.
    pub async fn list(&self) -> Result<Vec<RuntimeEnvironment>> {
        self.platform.describe_environments(&self.application).await
    }

    /// The environment with this name, regardless of status.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<RuntimeEnvironment>> {
        let environments = self.list().await?;
        Ok(environments.into_iter().find(|env| env.name == name))
    }

    /// The environment with this name, excluding terminated ones. A dead
    /// namesake must never be mistaken for a live deploy target.
    pub async fn find_running_by_name(&self, name: &str) -> Result<Option<RuntimeEnvironment>> {
        let environments = self.list().await?;
        Ok(environments
            .into_iter()
            .find(|env| env.name == name && env.status.is_running()))
    }
}
