//! AI voice endpoint negotiation
//!
//! Posts the broker-generated offer to the AI endpoint as raw SDP and wraps
//! the raw response body as the answer.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::types::SessionDescription;

/// Merge query parameters for the AI endpoint.
///
/// Caller parameters win: every value of a caller key is kept, and a
/// configured key is only added when the caller did not send it. The result is
/// ordered by key, values of the same key keep their relative order.
pub fn merge_query(
    configured: &[(String, String)],
    caller: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = caller.to_vec();
    merged.extend(
        configured
            .iter()
            .filter(|(key, _)| !caller.iter().any(|(k, _)| k == key))
            .cloned(),
    );
    merged.sort_by(|a, b| a.0.cmp(&b.0));
    merged
}

/// Client for the speech-capable AI endpoint
#[derive(Debug, Clone)]
pub struct VoiceClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl VoiceClient {
    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
        }
    }

    pub fn from_config(client: Client, config: &BridgeConfig) -> Self {
        Self::new(client, config.ai_endpoint.clone(), config.ai_api_key.clone())
    }

    /// Endpoint URL with the configured defaults merged under the caller's
    /// parameters
    pub fn negotiation_url(&self, caller_params: &[(String, String)]) -> Url {
        let mut url = self.endpoint.clone();
        let configured: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let merged = merge_query(&configured, caller_params);

        if merged.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(merged.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url
    }

    /// Exchange `offer` for the AI endpoint's answer.
    ///
    /// A non-2xx status is logged but still returned as an answer; only
    /// transport failures are errors here.
    pub async fn negotiate(
        &self,
        caller_params: &[(String, String)],
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        let url = self.negotiation_url(caller_params);
        tracing::info!("→ Negotiating with AI endpoint {}", url.path());

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer.sdp.clone())
            .send()
            .await?;

        let status = response.status();
        let answer = response.text().await?;

        if !status.is_success() {
            tracing::warn!(%status, "AI endpoint returned non-success status, using body as answer");
        } else {
            tracing::info!("✓ AI answer received ({} bytes)", answer.len());
        }

        Ok(SessionDescription::answer(answer))
    }
}
