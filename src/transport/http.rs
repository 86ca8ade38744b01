use super::{
    ConnectionEnvelope, ConnectionTransport, ConnectionsEnvelope, ErrorBody, ProfileRepository,
    StatusBody, TransportError,
};
use crate::config::SyncConfig;
use crate::lifecycle::ConnectionStatus;
use crate::model::{Connection, NewConnectionRequest, Profile, ProfileUpdate};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// REST client for the connection and profile endpoints
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::network(e.to_string()))?;
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            TransportError::network(format!("Invalid base URL {}: {}", base_url, e))
        })?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, TransportError> {
        Self::new(&config.api_base_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Base URL plus one percent-encoded path segment per entry
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::network(format!("Base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-2xx response into a TransportError, preferring the body's
    /// `error` field over the status line.
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| status_text(status));

        Err(TransportError::new(status.as_u16(), message))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
        let response = Self::check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::network(format!("Invalid response body: {}", e)))
    }
}

fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

fn send_error(err: reqwest::Error) -> TransportError {
    TransportError {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

#[async_trait]
impl ConnectionTransport for HttpTransport {
    async fn list_connections(&self, user_id: &str) -> Result<Vec<Connection>, TransportError> {
        debug!(user_id, "GET connections");
        let response = self
            .client
            .get(self.endpoint(&["connections"])?)
            .query(&[("userId", user_id)])
            .send()
            .await
            .map_err(send_error)?;

        let envelope: ConnectionsEnvelope = Self::read_json(response).await?;
        Ok(envelope.connections)
    }

    async fn create_connection(
        &self,
        request: &NewConnectionRequest,
    ) -> Result<Connection, TransportError> {
        debug!(recipient = %request.recipient_id, "POST connections");
        let response = self
            .client
            .post(self.endpoint(&["connections"])?)
            .json(request)
            .send()
            .await
            .map_err(send_error)?;

        let envelope: ConnectionEnvelope = Self::read_json(response).await?;
        Ok(envelope.connection)
    }

    async fn update_connection_status(
        &self,
        id: &str,
        status: ConnectionStatus,
    ) -> Result<Connection, TransportError> {
        debug!(id, %status, "PATCH connection");
        let response = self
            .client
            .patch(self.endpoint(&["connections", id])?)
            .json(&StatusBody { status })
            .send()
            .await
            .map_err(send_error)?;

        let envelope: ConnectionEnvelope = Self::read_json(response).await?;
        Ok(envelope.connection)
    }

    async fn delete_connection(&self, id: &str) -> Result<(), TransportError> {
        debug!(id, "DELETE connection");
        let response = self
            .client
            .delete(self.endpoint(&["connections", id])?)
            .send()
            .await
            .map_err(send_error)?;

        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for HttpTransport {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, TransportError> {
        let response = self
            .client
            .get(self.endpoint(&["profiles", user_id])?)
            .send()
            .await
            .map_err(send_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let profile: Profile = Self::read_json(response).await?;
        Ok(Some(profile))
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, TransportError> {
        let response = self
            .client
            .patch(self.endpoint(&["profiles", user_id])?)
            .json(&update.to_patch_body())
            .send()
            .await
            .map_err(send_error)?;

        Self::read_json(response).await
    }
}
