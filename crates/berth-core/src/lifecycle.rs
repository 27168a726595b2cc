//! Environment lifecycle control: the create-vs-update decision, the
//! ordered two-phase update, and the readiness barriers.
//!
//! Deployment is declarative-idempotent at the granularity of "does a
//! live environment with this name exist": redeploying the same artifact
//! to an existing environment always takes the update path.
//!
//! Concurrent deploys to the same environment name are not coordinated
//! here; there is no lock or lease on a remote environment. Callers must
//! serialize deployments to one environment name externally.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::EnvironmentSpec;
use crate::directory::EnvironmentDirectory;
use crate::error::Result;
use crate::poll::{PollConfig, poll_until};
use crate::provider::{
    CreateEnvironmentRequest, EnvironmentStatus, PlatformApi, RuntimeEnvironment,
    UpdateEnvironmentRequest,
};
use crate::registry::VersionLabel;

/// Which path a deploy took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// No live environment with the name existed; a new one was launched
    Created,
    /// A live environment was updated in place
    Updated,
}

/// Drives create, update and terminate against one application.
pub struct LifecycleController {
    platform: Arc<dyn PlatformApi>,
    directory: EnvironmentDirectory,
    application: String,
    poll: PollConfig,
    wait_on_create: bool,
}

impl LifecycleController {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        application: &str,
        poll: PollConfig,
        wait_on_create: bool,
    ) -> Self {
        LifecycleController {
            directory: EnvironmentDirectory::new(platform.clone(), application),
            platform,
            application: application.to_string(),
            poll,
            wait_on_create,
        }
    }

    /// Deploy `label` to the environment named `name`.
    ///
    /// A live environment with that name means update; absence (including
    /// a terminated namesake) means create. The decision is made against a
    /// single directory snapshot taken here.
    pub async fn deploy(
        &self,
        name: &str,
        spec: &EnvironmentSpec,
        label: &VersionLabel,
        progress: &mut dyn FnMut(u32),
    ) -> anyhow::Result<DeployOutcome> {
        let existing = self
            .directory
            .find_running_by_name(name)
            .await
            .context("failed to query environment directory")?;

        match existing {
            Some(environment) => {
                self.update(&environment, spec, label, progress).await?;
                Ok(DeployOutcome::Updated)
            }
            None => {
                self.create(name, spec, label, progress).await?;
                Ok(DeployOutcome::Created)
            }
        }
    }

    /// Create path: one full creation request carrying the spec and the
    /// registered version. Fire-and-forget unless `wait_on_create` opts
    /// into a readiness barrier.
    async fn create(
        &self,
        name: &str,
        spec: &EnvironmentSpec,
        label: &VersionLabel,
        progress: &mut dyn FnMut(u32),
    ) -> anyhow::Result<()> {
        let request = CreateEnvironmentRequest {
            application: self.application.clone(),
            name: name.to_string(),
            description: spec.description.clone(),
            cname_prefix: spec.cname_prefix.clone(),
            platform: spec.platform.clone(),
            option_settings: spec.flattened_options(),
            version_label: label.as_str().to_string(),
        };

        info!(environment = name, label = %label, "creating environment");
        self.platform
            .create_environment(&request)
            .await
            .with_context(|| format!("failed to create environment '{}'", name))?;

        if self.wait_on_create {
            self.await_status(name, EnvironmentStatus::Ready, progress)
                .await
                .with_context(|| format!("environment '{}' did not become Ready", name))?;
        }
        Ok(())
    }

    /// Update path, strictly ordered: settings first, then a readiness
    /// barrier, then the version pointer. The platform applies settings
    /// asynchronously; a version update submitted while settings are
    /// still propagating can be rejected or reordered remotely.
    async fn update(
        &self,
        environment: &RuntimeEnvironment,
        spec: &EnvironmentSpec,
        label: &VersionLabel,
        progress: &mut dyn FnMut(u32),
    ) -> anyhow::Result<()> {
        let name = environment.name.as_str();

        info!(environment = name, "updating environment settings");
        let settings =
            UpdateEnvironmentRequest::settings(&self.application, name, spec.flattened_options());
        self.platform
            .update_environment(&settings)
            .await
            .with_context(|| format!("failed to update settings of '{}'", name))?;

        self.await_status(name, EnvironmentStatus::Ready, progress)
            .await
            .with_context(|| format!("environment '{}' did not settle after settings update", name))?;

        info!(environment = name, label = %label, "updating environment version");
        let version = UpdateEnvironmentRequest::version(&self.application, name, label.as_str());
        self.platform
            .update_environment(&version)
            .await
            .with_context(|| format!("failed to update version of '{}'", name))?;
        Ok(())
    }

    /// Submit a termination request for the running environment named
    /// `name`. Returns whether a request was issued: terminating an
    /// absent or already-terminated environment is a no-op, not an error.
    pub async fn terminate(&self, name: &str) -> anyhow::Result<bool> {
        let existing = self
            .directory
            .find_running_by_name(name)
            .await
            .context("failed to query environment directory")?;

        let Some(environment) = existing else {
            info!(environment = name, "no running environment to terminate");
            return Ok(false);
        };

        info!(environment = name, id = %environment.environment_id, "terminating environment");
        self.platform
            .terminate_environment(&environment.environment_id)
            .await
            .with_context(|| format!("failed to terminate environment '{}'", name))?;
        Ok(true)
    }

    /// Block until the named environment reports `target`.
    async fn await_status(
        &self,
        name: &str,
        target: EnvironmentStatus,
        progress: &mut dyn FnMut(u32),
    ) -> Result<()> {
        poll_until(
            &self.poll,
            || self.directory.find_by_name(name),
            |env: &Option<RuntimeEnvironment>| {
                env.as_ref().is_some_and(|e| e.status == target)
            },
            progress,
        )
        .await?;
        Ok(())
    }
}
