//! HTTP implementation of the node agent contract

use crate::error::{AgentError, Result};
use crate::{CreatedUser, NodeAgent, RemoteInbound, RemoteUser};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Settings for [`HttpNodeAgent`]
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Bearer token sent on every call
    pub token: String,
    /// URL scheme, `http` or `https`
    pub scheme: String,
    /// Port the agent listens on, identical across nodes
    pub port: u16,
    /// Per-call timeout
    pub timeout: Duration,
    /// Idle pooled connections kept per node
    pub max_idle_per_node: usize,
}

impl AgentConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_idle_per_node(mut self, max_idle: usize) -> Self {
        self.max_idle_per_node = max_idle;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            scheme: "http".to_string(),
            port: 8000,
            timeout: Duration::from_secs(3),
            max_idle_per_node: 10,
        }
    }
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    inbound: &'a str,
    id: &'a str,
}

#[derive(Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<RemoteUser>,
}

#[derive(Deserialize)]
struct InboundsResponse {
    #[serde(default)]
    inbounds: Vec<RemoteInbound>,
}

/// Node agent reached over JSON/HTTP
///
/// One pooled `reqwest::Client` is shared by every node; the pool keeps at
/// most `max_idle_per_node` idle connections per host.
#[derive(Debug, Clone)]
pub struct HttpNodeAgent {
    client: reqwest::Client,
    scheme: String,
    port: u16,
}

impl HttpNodeAgent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| AgentError::Client(format!("invalid token: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_idle_per_node)
            .build()
            .map_err(|e| AgentError::Client(e.to_string()))?;

        Ok(Self {
            client,
            scheme: config.scheme,
            port: config.port,
        })
    }

    fn url(&self, node: &str, path: &str) -> Result<String> {
        if node.is_empty() || node.contains(['/', '?', '#', '@']) || node.contains(char::is_whitespace)
        {
            return Err(AgentError::InvalidAddress(node.to_string()));
        }
        Ok(format!("{}://{}:{}{}", self.scheme, node, self.port, path))
    }

    async fn send(&self, node: &str, request: reqwest::RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|source| AgentError::Transport {
            node: node.to_string(),
            source,
        })
    }

    async fn decode<T: DeserializeOwned>(node: &str, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(node, response).await);
        }

        response.json::<T>().await.map_err(|e| AgentError::Decode {
            node: node.to_string(),
            reason: e.to_string(),
        })
    }

    async fn status_error(node: &str, response: Response) -> AgentError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        AgentError::Status {
            node: node.to_string(),
            status,
            body,
        }
    }
}

#[async_trait]
impl NodeAgent for HttpNodeAgent {
    async fn create_user(
        &self,
        node: &str,
        protocol: &str,
        user_id: &str,
    ) -> Result<CreatedUser> {
        let url = self.url(node, "/user")?;
        let request = self.client.post(url).json(&CreateRequest {
            inbound: protocol,
            id: user_id,
        });

        let response = self.send(node, request).await?;
        let created: CreatedUser = Self::decode(node, response).await?;
        debug!(node, user_id, protocol, "Credential created");
        Ok(created)
    }

    async fn delete_user(&self, node: &str, user_id: &str) -> Result<()> {
        let url = self.url(node, "/user")?;
        let request = self.client.delete(url).query(&[("id", user_id)]);

        let response = self.send(node, request).await?;
        match response.status() {
            status if status.is_success() => {
                debug!(node, user_id, "Credential removed");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                debug!(node, user_id, "Credential already absent");
                Ok(())
            }
            _ => {
                let err = Self::status_error(node, response).await;
                warn!(node, user_id, "Delete rejected: {}", err);
                Err(err)
            }
        }
    }

    async fn list_users(&self, node: &str) -> Result<Vec<RemoteUser>> {
        let url = self.url(node, "/user")?;
        let response = self.send(node, self.client.get(url)).await?;
        let body: UsersResponse = Self::decode(node, response).await?;
        Ok(body.users)
    }

    async fn list_inbounds(&self, node: &str) -> Result<Vec<RemoteInbound>> {
        let url = self.url(node, "/inbound")?;
        let response = self.send(node, self.client.get(url)).await?;
        let body: InboundsResponse = Self::decode(node, response).await?;
        Ok(body.inbounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_layout() {
        let agent = HttpNodeAgent::new(AgentConfig::new("t").with_port(9000)).unwrap();
        assert_eq!(
            agent.url("10.0.0.5", "/user").unwrap(),
            "http://10.0.0.5:9000/user"
        );
    }

    #[test]
    fn test_rejects_addresses_that_escape_the_host() {
        let agent = HttpNodeAgent::new(AgentConfig::new("t")).unwrap();
        for bad in ["", "evil.com/x", "a b", "user@host", "h?x=1"] {
            assert!(
                matches!(agent.url(bad, "/user"), Err(AgentError::InvalidAddress(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_unprintable_token() {
        assert!(matches!(
            HttpNodeAgent::new(AgentConfig::new("bad\ntoken")),
            Err(AgentError::Client(_))
        ));
    }
}
