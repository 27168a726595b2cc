//! Thin reqwest-backed provider clients.
//!
//! No retry, no backoff, no caching: a transport failure propagates to
//! the caller as a fatal deployment error. Clients are built once per
//! invocation from resolved credentials and hold no other state.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::json;
use url::Url;

use super::{
    CreateEnvironmentRequest, CreateVersionRequest, ObjectStore, PlatformApi, RuntimeEnvironment,
    UpdateEnvironmentRequest,
};
use crate::config::{Credentials, ProjectSection};
use crate::error::{DeployError, Result};

const USER_AGENT: &str = concat!("berth/", env!("CARGO_PKG_VERSION"));

/// Capability resolved once at configuration time: endpoint layout plus
/// object-store construction. Replaces per-call-site dispatch on a
/// "which flavor of region" boolean.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    platform_endpoint: Url,
    storage_endpoint: Url,
    encrypted_uploads: bool,
    credentials: Credentials,
}

impl ProviderProfile {
    /// Build the profile from project configuration. The endpoint
    /// override, when present, wins over the region-derived default.
    pub fn from_config(project: &ProjectSection, credentials: Credentials) -> Result<Self> {
        let (platform_endpoint, storage_endpoint) = match &project.endpoint {
            Some(base) => {
                // Url::join drops the last path segment without a trailing slash
                let normalized = if base.ends_with('/') {
                    base.clone()
                } else {
                    format!("{}/", base)
                };
                let base = Url::parse(&normalized).map_err(|e| {
                    DeployError::configuration(format!("invalid endpoint '{}': {}", base, e))
                })?;
                (join_url(&base, "platform/")?, join_url(&base, "storage/")?)
            }
            None => {
                let platform =
                    Url::parse(&format!("https://platform.{}.berth.dev", project.region));
                let storage = Url::parse(&format!("https://storage.{}.berth.dev", project.region));
                match (platform, storage) {
                    (Ok(p), Ok(s)) => (p, s),
                    _ => {
                        return Err(DeployError::configuration(format!(
                            "region '{}' does not form a valid endpoint",
                            project.region
                        )));
                    }
                }
            }
        };

        Ok(ProviderProfile {
            platform_endpoint,
            storage_endpoint,
            encrypted_uploads: project.encrypted_uploads,
            credentials,
        })
    }

    /// Platform API client for this profile.
    pub fn platform_api(&self) -> Result<Arc<dyn PlatformApi>> {
        Ok(Arc::new(HttpPlatformApi::new(
            self.platform_endpoint.clone(),
            self.credentials.clone(),
        )?))
    }

    /// Object-store client for this profile. The encrypting variant is
    /// the same client with the envelope attribute enabled; selection
    /// happens here, once, not at call sites.
    pub fn object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(HttpObjectStore::new(
            self.storage_endpoint.clone(),
            self.credentials.clone(),
            self.encrypted_uploads,
        )?))
    }
}

fn join_url(base: &Url, segment: &str) -> Result<Url> {
    base.join(segment)
        .map_err(|e| DeployError::configuration(format!("invalid endpoint path: {}", e)))
}

fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(DeployError::from)
}

fn authorize(builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
    builder
        .header("x-berth-access-key", &credentials.access_key)
        .header("x-berth-secret-key", &credentials.secret_key)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(DeployError::Provider {
        status: status.as_u16(),
        message,
    })
}

/// Platform API over HTTP.
pub struct HttpPlatformApi {
    client: Client,
    endpoint: Url,
    credentials: Credentials,
}

impl HttpPlatformApi {
    pub fn new(endpoint: Url, credentials: Credentials) -> Result<Self> {
        Ok(HttpPlatformApi {
            client: build_client()?,
            endpoint,
            credentials,
        })
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<RequestBuilder> {
        let url = join_url(&self.endpoint, path)?;
        Ok(authorize(self.client.post(url), &self.credentials).json(body))
    }
}

#[async_trait]
impl PlatformApi for HttpPlatformApi {
    async fn describe_environments(&self, application: &str) -> Result<Vec<RuntimeEnvironment>> {
        let url = join_url(&self.endpoint, "environments/describe")?;
        let response = authorize(self.client.get(url), &self.credentials)
            .query(&[("application", application)])
            .send()
            .await?;
        let environments = check_status(response).await?.json().await?;
        Ok(environments)
    }

    async fn create_environment(&self, request: &CreateEnvironmentRequest) -> Result<()> {
        let response = self.post("environments/create", request)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn update_environment(&self, request: &UpdateEnvironmentRequest) -> Result<()> {
        let response = self.post("environments/update", request)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn terminate_environment(&self, environment_id: &str) -> Result<()> {
        let body = json!({ "environmentId": environment_id });
        let response = self.post("environments/terminate", &body)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn create_application_version(&self, request: &CreateVersionRequest) -> Result<()> {
        let response = self.post("versions/create", request)?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_application_version(
        &self,
        application: &str,
        version_label: &str,
        delete_source: bool,
    ) -> Result<()> {
        let body = json!({
            "application": application,
            "versionLabel": version_label,
            "deleteSourceBundle": delete_source,
        });
        let response = self.post("versions/delete", &body)?.send().await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Object storage over HTTP.
///
/// When `encrypted_uploads` is set, objects are stored with envelope
/// encryption requested as a put attribute; key management lives behind
/// the storage service, outside this crate.
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    credentials: Credentials,
    encrypted_uploads: bool,
}

impl HttpObjectStore {
    pub fn new(endpoint: Url, credentials: Credentials, encrypted_uploads: bool) -> Result<Self> {
        Ok(HttpObjectStore {
            client: build_client()?,
            endpoint,
            credentials,
            encrypted_uploads,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        join_url(&self.endpoint, &format!("{}/{}", bucket, key))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let url = join_url(&self.endpoint, bucket)?;
        let response = authorize(self.client.head(url), &self.credentials)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let url = join_url(&self.endpoint, bucket)?;
        let response = authorize(self.client.put(url), &self.credentials)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(bucket, key)?;
        let mut request = authorize(self.client.put(url), &self.credentials).body(body);
        if self.encrypted_uploads {
            request = request.header("x-berth-envelope-encryption", "ephemeral");
        }
        let response = request.send().await?;
        check_status(response).await?;
        Ok(())
    }
}
