//! Workflow API Client
//!
//! HTTP client for communicating with the payout workflow service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use super::error::{ErrorKind, GatewayError};
use super::types::*;
use super::{GatewayResult, WorkflowGateway};
use crate::logic::decision::{DecisionRecord, HistoryFilter};

/// Workflow service configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

/// Workflow API client
pub struct HttpGateway {
    config: GatewayConfig,
    http_client: reqwest::Client,
}

impl HttpGateway {
    /// Create new gateway client
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(GatewayError::network)?;

        Ok(Self { config, http_client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Base URL extended by `segments`, each percent-encoded as one segment.
    fn segment_url(&self, segments: &[&str]) -> GatewayResult<Url> {
        let invalid = || GatewayError::new(ErrorKind::Unknown, format!("Invalid service URL: {}", self.config.base_url));

        let mut url = Url::parse(&self.config.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send and fail on any non-2xx status.
    async fn send(&self, request: RequestBuilder, op: &str) -> GatewayResult<Response> {
        let response = request.send().await.map_err(|e| {
            log::warn!("{} failed before a response: {}", op, e);
            GatewayError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = GatewayError::from_response(status.as_u16(), &body);
        log::warn!("{} rejected ({}): {}", op, status.as_u16(), err.message);
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, op: &str) -> GatewayResult<T> {
        let response = self.send(request, op).await?;
        response.json::<T>().await.map_err(|e| {
            log::error!("{} returned an unreadable body: {}", op, e);
            GatewayError::decode(e)
        })
    }
}

#[async_trait]
impl WorkflowGateway for HttpGateway {
    async fn health(&self) -> GatewayResult<()> {
        let request = self.http_client.get(self.url("/health"));
        self.send(request, "health").await.map(|_| ())
    }

    async fn submit_decision(&self, request: &PayoutDecisionRequest) -> GatewayResult<DecisionOutcome> {
        log::debug!("Submitting decision request for {}", request.user_id);
        let builder = self.http_client.post(self.url("/payout/decision")).json(request);
        self.send_json(builder, "submit decision").await
    }

    async fn fetch_history(&self, filter: &HistoryFilter) -> GatewayResult<Vec<DecisionRecord>> {
        log::debug!("Fetching history: {:?}", filter);
        let builder = self.http_client.get(self.url("/payout/history")).query(filter);
        self.send_json(builder, "fetch history").await
    }

    async fn submit_human_action(&self, request: &HumanActionRequest) -> GatewayResult<()> {
        log::debug!("Submitting {:?} for decision {}", request.action, request.decision_id);
        let builder = self.http_client.post(self.url("/payout/human-review")).json(request);
        self.send(builder, "human review").await.map(|_| ())
    }

    async fn resolve_review(&self, request: &ResolveReviewRequest) -> GatewayResult<()> {
        log::debug!("Resolving review {} as {}", request.decision_id, request.final_decision);
        let builder = self.http_client.post(self.url("/payout/resolve-review")).json(request);
        self.send(builder, "resolve review").await.map(|_| ())
    }

    async fn fetch_review_rationale(&self, decision_id: &str) -> GatewayResult<String> {
        let url = self.segment_url(&["payout", decision_id, "review-rationale"])?;
        let response = self.send(self.http_client.get(url), "review rationale").await?;
        let body = response.text().await.map_err(GatewayError::decode)?;

        Ok(match serde_json::from_str::<RationaleBody>(&body) {
            Ok(parsed) => parsed.into_text(),
            Err(_) => body.trim().to_string(),
        })
    }

    async fn fetch_weights(&self) -> GatewayResult<WeightsResource> {
        let builder = self.http_client.get(self.url("/admin/weights"));
        self.send_json(builder, "fetch weights").await
    }

    async fn patch_weights(&self, weights: &WeightsMap) -> GatewayResult<WeightsResource> {
        log::debug!("Patching {} signal weights", weights.len());
        let body = PatchWeightsRequest { signal_weights: weights };
        let builder = self.http_client.patch(self.url("/admin/weights")).json(&body);
        self.send_json(builder, "patch weights").await
    }

    async fn fetch_conflicted(&self) -> GatewayResult<Vec<ConflictedDecision>> {
        let builder = self.http_client.get(self.url("/admin/conflicted-decisions"));
        let list: ConflictedList = self.send_json(builder, "fetch conflicted").await?;
        Ok(list.into_vec())
    }

    async fn approve_for_learning(&self, human_review_id: &str) -> GatewayResult<ApproveLearningResponse> {
        let url = self.segment_url(&["admin", "conflicted-decisions", human_review_id, "approve"])?;
        let response = self.send(self.http_client.post(url), "approve for learning").await?;
        let body = response.text().await.map_err(GatewayError::decode)?;

        // An empty 2xx body means "approved, nothing to propose"
        if body.trim().is_empty() {
            return Ok(ApproveLearningResponse::default());
        }
        serde_json::from_str(&body).map_err(GatewayError::decode)
    }
}
