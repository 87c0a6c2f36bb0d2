use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::constants::REGISTRATION_API_BASE;
use crate::utils::net::http_base;
use crate::RegistrationError;
use crate::Resource;
use crate::ResourceKind;
use crate::Result;

/// Registration push protocol towards one registry.
///
/// `registry` is the registry's base URL as found by discovery.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync + 'static {
    /// Creates or updates `resource`.
    async fn register(
        &self,
        registry: &str,
        resource: &Resource,
    ) -> Result<()>;

    /// Removes a resource. An already absent resource counts as removed.
    async fn deregister(
        &self,
        registry: &str,
        kind: ResourceKind,
        id: &str,
    ) -> Result<()>;

    async fn heartbeat(
        &self,
        registry: &str,
        node_id: &str,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct RegistrationRequest<'a> {
    #[serde(rename = "type")]
    kind: ResourceKind,
    data: &'a Resource,
}

/// [`RegistryClient`] speaking plain HTTP.
#[derive(Clone, Default)]
pub struct HttpRegistryClient {
    http: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn endpoint(
        registry: &str,
        path: &str,
    ) -> String {
        format!("{}/{}/{}", http_base(registry), REGISTRATION_API_BASE, path)
    }
}

fn check(
    operation: &'static str,
    status: StatusCode,
) -> Result<()> {
    if status.as_u16() >= 300 {
        return Err(RegistrationError::Rejected {
            operation,
            status: status.as_u16(),
        }
        .into());
    }
    Ok(())
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn register(
        &self,
        registry: &str,
        resource: &Resource,
    ) -> Result<()> {
        let body = RegistrationRequest {
            kind: resource.kind(),
            data: resource,
        };
        let response = self
            .http
            .post(Self::endpoint(registry, "resource"))
            .json(&body)
            .send()
            .await
            .map_err(RegistrationError::from)?;

        debug!(kind = %resource.kind(), status = %response.status(), "Registered resource");
        check("register", response.status())
    }

    async fn deregister(
        &self,
        registry: &str,
        kind: ResourceKind,
        id: &str,
    ) -> Result<()> {
        let response = self
            .http
            .delete(Self::endpoint(registry, &format!("resource/{}/{}", kind.plural(), id)))
            .send()
            .await
            .map_err(RegistrationError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(%kind, %id, "Resource already absent at registry");
            return Ok(());
        }
        check("deregister", response.status())
    }

    async fn heartbeat(
        &self,
        registry: &str,
        node_id: &str,
    ) -> Result<()> {
        let response = self
            .http
            .post(Self::endpoint(registry, &format!("health/nodes/{node_id}")))
            .send()
            .await
            .map_err(RegistrationError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistrationError::UnknownNode(node_id.to_string()).into());
        }
        check("heartbeat", response.status())
    }
}
