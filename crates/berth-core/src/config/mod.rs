//! Configuration schema for berth.toml
//!
//! A project configuration is resolved once per invocation and never
//! mutated afterwards: application name, region/endpoint selection, the
//! artifact bucket, and one `[environments.<name>]` table per deployable
//! target. Credentials come from the environment (or the user-level
//! credentials file) and their absence is fatal before any remote call.

pub mod parser;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

pub use parser::{load_project_config, parse_project_config_str};

/// Root structure for berth.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project-level settings
    pub project: ProjectSection,

    /// Deployable targets, keyed by environment name
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentSpec>,

    /// Credentials, resolved at load time and never read from berth.toml
    #[serde(skip)]
    pub credentials: Credentials,
}

/// `[project]` table of berth.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Application name on the remote platform
    pub application: String,

    /// Target region identifier
    pub region: String,

    /// Endpoint override for self-hosted or partition deployments
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Content bucket for uploaded artifacts
    pub bucket: String,

    /// Default artifact path (file or directory) for deploys
    #[serde(default)]
    pub artifact: Option<PathBuf>,

    /// Request envelope encryption on uploaded artifacts
    #[serde(default)]
    pub encrypted_uploads: bool,

    /// Block on the create path until the new environment is Ready.
    /// Off by default: a freshly created environment is fire-and-forget,
    /// only the update path carries a readiness barrier.
    #[serde(default)]
    pub wait_on_create: bool,

    /// Seconds between status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Optional upper bound on a single readiness wait, in seconds.
    /// Unset means the poll blocks until the environment converges.
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,
}

fn default_poll_interval() -> u64 {
    3
}

/// Declarative description of one deployable target.
///
/// Sourced from configuration, never mutated at runtime. Option settings
/// are grouped by namespace; `BTreeMap` keeps iteration deterministic so
/// duplicate (namespace, key) pairs resolve last-one-wins stably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Human description shown on the platform console
    #[serde(default)]
    pub description: String,

    /// DNS prefix hint for the environment's public hostname
    pub cname_prefix: String,

    /// Platform/solution stack identifier
    pub platform: String,

    /// Option settings grouped namespace -> { key: value }
    #[serde(default)]
    pub options: BTreeMap<String, BTreeMap<String, String>>,
}

impl EnvironmentSpec {
    /// Flatten the nested namespace grouping into the list the platform
    /// API expects. Lossless and order-preserving: the output length is
    /// the sum of the per-namespace item counts.
    pub fn flattened_options(&self) -> Vec<OptionSetting> {
        self.options
            .iter()
            .flat_map(|(namespace, entries)| {
                entries.iter().map(|(key, value)| OptionSetting {
                    namespace: namespace.clone(),
                    key: key.clone(),
                    value: value.clone(),
                })
            })
            .collect()
    }
}

/// A (namespace, key, value) triple controlling platform behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSetting {
    pub namespace: String,
    #[serde(rename = "optionName")]
    pub key: String,
    pub value: String,
}

/// Access credentials for the remote platform and object storage.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

/// File shape of `~/.config/berth/credentials.toml`
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    access_key: Option<String>,
    secret_key: Option<String>,
}

impl Credentials {
    /// Resolve credentials from `BERTH_ACCESS_KEY` / `BERTH_SECRET_KEY`,
    /// falling back to the user-level credentials file. Missing either
    /// half is a fatal configuration error, raised before any remote call.
    pub fn resolve() -> Result<Self> {
        let from_env = (
            std::env::var("BERTH_ACCESS_KEY").ok(),
            std::env::var("BERTH_SECRET_KEY").ok(),
        );
        let (mut access_key, mut secret_key) = from_env;

        if access_key.is_none() || secret_key.is_none() {
            if let Some(file) = Self::read_credentials_file()? {
                access_key = access_key.or(file.access_key);
                secret_key = secret_key.or(file.secret_key);
            }
        }

        match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Credentials {
                access_key,
                secret_key,
            }),
            (None, _) => Err(DeployError::configuration(
                "missing access key: set BERTH_ACCESS_KEY or add it to the credentials file",
            )),
            (_, None) => Err(DeployError::configuration(
                "missing secret key: set BERTH_SECRET_KEY or add it to the credentials file",
            )),
        }
    }

    fn read_credentials_file() -> Result<Option<CredentialsFile>> {
        let Some(path) = Self::credentials_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let file = toml::from_str(&content).map_err(|e| {
            DeployError::configuration(format!(
                "invalid credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(file))
    }

    /// `~/.config/berth/credentials.toml` (platform-dependent config dir)
    pub fn credentials_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("berth").join("credentials.toml"))
    }
}

impl ProjectConfig {
    /// Look up the environment spec selected for this deployment call.
    /// An unknown name is a configuration error, not a remote failure.
    pub fn environment(&self, name: &str) -> Result<&EnvironmentSpec> {
        self.environments.get(name).ok_or_else(|| {
            DeployError::configuration(format!(
                "environment '{}' is not defined in berth.toml (known: {})",
                name,
                self.environments
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Validate the configuration after parsing.
    pub fn validate(&self) -> Result<()> {
        if self.project.application.trim().is_empty() {
            return Err(DeployError::configuration(
                "project.application must not be empty",
            ));
        }
        if self.project.bucket.trim().is_empty() {
            return Err(DeployError::configuration(
                "project.bucket must not be empty",
            ));
        }
        for (name, spec) in &self.environments {
            if spec.platform.trim().is_empty() {
                return Err(DeployError::configuration(format!(
                    "environments.{}.platform must not be empty",
                    name
                )));
            }
            if spec.cname_prefix.trim().is_empty() {
                return Err(DeployError::configuration(format!(
                    "environments.{}.cname_prefix must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}
