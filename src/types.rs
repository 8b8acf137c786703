//! Wire types shared by the broker client, the AI negotiation client and the
//! exchange orchestrator.
//!
//! Track batches are a closed set of tagged variants rather than loose JSON
//! maps; serde renders them in the broker's `location`-tagged schema.

use serde::{Deserialize, Deserializer, Serialize};

/// Track name of the caller's microphone in Session A
pub const USER_MIC_TRACK: &str = "user-mic";

/// Track name of the AI voice in Session B
pub const AI_VOICE_TRACK: &str = "ai-generated-voice";

/// SDP type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A WebRTC session description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: SdpType,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: SdpType::Offer,
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: SdpType::Answer,
        }
    }
}

/// Media kind of a published track. Only audio is bridged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
}

/// One entry of a track negotiation batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "location")]
pub enum TrackSpec {
    /// Publish a track that originates on this session's own peer
    #[serde(rename = "local", rename_all = "camelCase")]
    PublishLocal {
        track_name: String,
        #[serde(rename = "bidirectionalMediaStream")]
        bidirectional: bool,
        kind: TrackKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        mid: Option<String>,
    },
    /// Pull a track published on another broker session into this one
    #[serde(rename = "remote", rename_all = "camelCase")]
    SubscribeRemote {
        session_id: String,
        track_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mid: Option<String>,
    },
}

impl TrackSpec {
    /// Bidirectional local audio track
    pub fn local_audio(track_name: &str, mid: Option<&str>) -> Self {
        Self::PublishLocal {
            track_name: track_name.to_string(),
            bidirectional: true,
            kind: TrackKind::Audio,
            mid: mid.map(str::to_string),
        }
    }

    /// Remote track living on `session_id`, correlated to `mid` on this side
    pub fn remote(session_id: &str, track_name: &str, mid: &str) -> Self {
        Self::SubscribeRemote {
            session_id: session_id.to_string(),
            track_name: track_name.to_string(),
            mid: Some(mid.to_string()),
        }
    }

    pub fn is_bidirectional_local(&self) -> bool {
        matches!(
            self,
            TrackSpec::PublishLocal {
                bidirectional: true,
                ..
            }
        )
    }
}

/// Body of `POST .../sessions/{id}/tracks/new`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracksRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_description: Option<SessionDescription>,
    pub tracks: Vec<TrackSpec>,
}

impl TracksRequest {
    pub fn new(tracks: Vec<TrackSpec>) -> Self {
        Self {
            session_description: None,
            tracks,
        }
    }

    pub fn with_offer(offer: SessionDescription, tracks: Vec<TrackSpec>) -> Self {
        Self {
            session_description: Some(offer),
            tracks,
        }
    }

    /// Whether the broker must answer this batch with a session description
    pub fn expects_sdp(&self) -> bool {
        self.tracks.iter().any(TrackSpec::is_bidirectional_local)
    }
}

/// Treat an explicit JSON `null` like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Broker result for a single track
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub track_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mid: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Broker result for a whole track batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracksResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tracks: Vec<TrackResult>,
    #[serde(default)]
    pub session_description: Option<SessionDescription>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Body of `POST .../sessions/new`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    pub session_id: String,
}

/// Body of `PUT .../sessions/{id}/renegotiate`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenegotiateRequest<'a> {
    pub session_description: &'a SessionDescription,
}
