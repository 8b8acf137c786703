//! Media broker signaling client
//!
//! Thin typed client for the broker's session and track control plane:
//! - create a session (optionally in third-party mode)
//! - publish / subscribe a batch of tracks
//! - push a renegotiated remote description
//!
//! Every call is exactly one HTTP round-trip. No timeout and no retry is
//! applied; the broker owns session expiry.

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::types::{
    NewSessionResponse, RenegotiateRequest, SessionDescription, TracksRequest, TracksResult,
};

/// Factory for broker sessions, holding the application credentials
#[derive(Debug, Clone)]
pub struct BrokerClient {
    client: Client,
    endpoint: String,
    headers: HeaderMap,
    stream_debug: bool,
}

impl BrokerClient {
    /// Build a client for `{base_url}/{app_id}` authenticated with `app_token`
    pub fn new(
        client: Client,
        base_url: &str,
        app_id: &str,
        app_token: &str,
        stream_debug: bool,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", app_token))
            .context("broker app token is not a valid header value")?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), app_id),
            headers,
            stream_debug,
        })
    }

    pub fn from_config(client: Client, config: &BridgeConfig) -> anyhow::Result<Self> {
        Self::new(
            client,
            &config.broker_base_url,
            &config.broker_app_id,
            &config.broker_app_token,
            config.broker_stream_debug,
        )
    }

    /// Create a new broker session. `third_party` flags it for
    /// server-mediated negotiation, used for the AI-facing leg.
    pub async fn create_session(&self, third_party: bool) -> Result<BrokerSession> {
        let mut query = Vec::new();
        if self.stream_debug {
            query.push("streamDebug");
        }
        if third_party {
            query.push("thirdparty=true");
        }
        let url = with_query(format!("{}/sessions/new", self.endpoint), &query);

        tracing::debug!(third_party, "→ POST {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .send()
            .await?;
        let created: NewSessionResponse = decode_json(response, "new session response").await?;

        tracing::info!(
            session_id = %created.session_id,
            third_party,
            "✓ broker session created"
        );

        Ok(BrokerSession {
            session_id: created.session_id,
            endpoint: self.endpoint.clone(),
            headers: self.headers.clone(),
            client: self.client.clone(),
            stream_debug: self.stream_debug,
        })
    }
}

/// One broker session. Immutable once created.
#[derive(Debug, Clone)]
pub struct BrokerSession {
    session_id: String,
    endpoint: String,
    headers: HeaderMap,
    client: Client,
    stream_debug: bool,
}

impl BrokerSession {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    fn session_url(&self, action: &str) -> String {
        let query: &[&str] = if self.stream_debug { &["streamDebug"] } else { &[] };
        with_query(
            format!("{}/sessions/{}/{}", self.endpoint, self.session_id, action),
            query,
        )
    }

    /// Publish or subscribe a batch of tracks. The broker negotiates the
    /// whole batch in a single SDP exchange.
    pub async fn new_tracks(&self, request: &TracksRequest) -> Result<TracksResult> {
        let url = self.session_url("tracks/new");
        tracing::debug!(
            session_id = %self.session_id,
            tracks = request.tracks.len(),
            with_offer = request.session_description.is_some(),
            "→ POST {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await?;

        decode_json(response, "tracks response").await
    }

    /// Push a new remote description into the session. Only the transport
    /// outcome matters, the response body is not interpreted.
    pub async fn renegotiate(&self, description: &SessionDescription) -> Result<()> {
        let url = self.session_url("renegotiate");
        tracing::debug!(session_id = %self.session_id, "→ PUT {}", url);

        let response = self
            .client
            .put(&url)
            .headers(self.headers.clone())
            .json(&RenegotiateRequest {
                session_description: description,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(
            session_id = %self.session_id,
            %status,
            "renegotiate response: {}",
            body
        );

        Ok(())
    }
}

fn with_query(url: String, query: &[&str]) -> String {
    if query.is_empty() {
        url
    } else {
        format!("{}?{}", url, query.join("&"))
    }
}

async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &'static str,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::warn!(%status, "broker returned non-success status for {}", what);
    }

    serde_json::from_str(&body).map_err(|e| BridgeError::decode(what, e))
}
