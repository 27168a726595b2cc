//! Berth Core Library
//!
//! Provides the domain logic for deploying application artifacts to a
//! managed platform: artifact upload, version registration, and
//! environment lifecycle orchestration with readiness polling.

pub mod artifact;
pub mod bundle;
pub mod config;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod orchestration;
pub mod poll;
pub mod provider;
pub mod registry;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{Credentials, EnvironmentSpec, OptionSetting, ProjectConfig};

    // Provider boundary
    pub use crate::provider::{
        EnvironmentStatus, ObjectStore, PlatformApi, ProviderProfile, RuntimeEnvironment,
    };

    // Orchestration
    pub use crate::orchestration::{DeployOutcome, DeployReport, Deployer};

    // Versioning
    pub use crate::registry::VersionLabel;

    // Errors
    pub use crate::error::DeployError;
}
