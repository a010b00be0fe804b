use std::time::Duration;

use opentelemetry_proto::tonic::trace::v1::TracesData;
use prost::Message;
use serde::Serialize;
use tokio::time::Instant;
use trylens_core::config::Config;
use trylens_core::error::{Result, TrylensError};
use trylens_core::ids::TryId;

use crate::FetchedTrace;
use crate::decode::decode_traces;

/// External-backend strategy. The backend indexes asynchronously, so a fetch
/// is a query-and-poll loop: retry on "not found yet" with exponential
/// backoff up to a hard wait budget, then degrade to absent. Network and
/// decode errors on an attempt are logged and treated like "not indexed yet".
#[derive(Clone)]
pub struct BackendStore {
    client: reqwest::Client,
    endpoint: String,
    initial_backoff: Duration,
    max_backoff: Duration,
    budget: Duration,
}

#[derive(Serialize)]
struct QueryRequest {
    filter: String,
}

impl BackendStore {
    pub fn new(
        endpoint: impl Into<String>,
        initial_backoff: Duration,
        max_backoff: Duration,
        budget: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            initial_backoff: initial_backoff.max(Duration::from_millis(1)),
            max_backoff,
            budget,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.backend_endpoint.clone(),
            cfg.fetch_initial_backoff,
            cfg.fetch_max_backoff,
            cfg.fetch_budget,
        )
    }

    pub async fn fetch(&self, try_id: &TryId) -> Result<Option<FetchedTrace>> {
        let deadline = Instant::now() + self.budget;
        let mut backoff = self.initial_backoff;

        loop {
            match self.query(try_id).await {
                Ok(Some(trace)) => return Ok(Some(trace)),
                Ok(None) => {
                    tracing::debug!(try_id = try_id.as_str(), "trace not indexed yet");
                }
                Err(err) => {
                    tracing::warn!(try_id = try_id.as_str(), error = %err, "backend query failed");
                }
            }

            if Instant::now() + backoff > deadline {
                tracing::debug!(try_id = try_id.as_str(), "fetch budget exhausted");
                return Ok(None);
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.max_backoff);
        }
    }

    async fn query(&self, try_id: &TryId) -> Result<Option<FetchedTrace>> {
        let url = format!("{}/api/traces:query", self.endpoint);
        let request = QueryRequest {
            filter: format!("span.try_id = \"{}\"", try_id.as_str()),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TrylensError::Backend(format!("query request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TrylensError::Backend(format!(
                "query returned {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TrylensError::Backend(format!("reading query response failed: {e}")))?;
        let data = TracesData::decode(body.as_ref())
            .map_err(|e| TrylensError::Parse(format!("bad traces payload: {e}")))?;

        let (trace_id, spans) = decode_traces(&data);
        if spans.is_empty() {
            return Ok(None);
        }
        Ok(Some(FetchedTrace { trace_id, spans }))
    }
}
