//! HTTP client for the collective memory service

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{Memory, MemoryError, MemoryService, ObjectiveState};
use crate::agent::ModelResponse;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemorizeRequest<'a> {
    sequence_id: &'a str,
    state: &'a ObjectiveState,
    action: &'a ModelResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RememberRequest<'a> {
    state: &'a ObjectiveState,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_id: Option<&'a str>,
}

/// `POST /memorize`, `POST /remember` and `GET /trajectory/{id}` against one endpoint
#[derive(Clone)]
pub struct HttpMemoryService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMemoryService {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MemoryError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, MemoryError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, MemoryError> {
        response
            .json::<T>()
            .await
            .map_err(|e| MemoryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MemoryService for HttpMemoryService {
    async fn memorize(
        &self,
        sequence_id: &str,
        state: &ObjectiveState,
        action: &ModelResponse,
    ) -> Result<(), MemoryError> {
        let body = MemorizeRequest {
            sequence_id,
            state,
            action,
        };
        self.send(self.client.post(format!("{}/memorize", self.endpoint)).json(&body))
            .await?;
        debug!("Memorized step for sequence {}", sequence_id);
        Ok(())
    }

    async fn remember(
        &self,
        state: &ObjectiveState,
        sequence_id: Option<&str>,
    ) -> Result<Vec<Memory>, MemoryError> {
        let body = RememberRequest { state, sequence_id };
        let response = self
            .send(self.client.post(format!("{}/remember", self.endpoint)).json(&body))
            .await?;
        Self::decode(response).await
    }

    async fn trajectory(&self, trajectory_id: &str) -> Result<Vec<Memory>, MemoryError> {
        let response = self
            .send(
                self.client
                    .get(format!("{}/trajectory/{}", self.endpoint, trajectory_id)),
            )
            .await?;
        Self::decode(response).await
    }
}
