//! Session exchange orchestration
//!
//! One call wires three parties through two broker sessions:
//! - Session A: caller <-> broker, bootstrapped on the request path
//! - Session B: broker <-> AI endpoint, third-party mode
//!
//! The caller gets Session A's answer as soon as both sessions exist. The AI
//! negotiation and the cross-session track relay then run on a detached task
//! whose failures are logged and recorded in the [`CallRegistry`], never
//! reported back to the caller.

use tracing::Instrument;
use uuid::Uuid;

use crate::broker::{BrokerClient, BrokerSession};
use crate::config::BridgeConfig;
use crate::error::{Result, ValidationError};
use crate::registry::{CallRegistry, ExchangeStage};
use crate::types::{
    SessionDescription, TrackSpec, TracksRequest, AI_VOICE_TRACK, USER_MIC_TRACK,
};
use crate::validate::validate;
use crate::voice::VoiceClient;

/// mid the caller's offer uses for its microphone
const USER_MIC_MID: &str = "0";

/// Answer handed back to the caller
#[derive(Debug, Clone)]
pub struct CallAnswer {
    pub call_id: String,
    pub answer: SessionDescription,
}

/// Entry point for bridged calls. Cheap to clone, holds no per-call state.
#[derive(Clone)]
pub struct Bridge {
    broker: BrokerClient,
    voice: VoiceClient,
    registry: CallRegistry,
}

impl Bridge {
    pub fn new(broker: BrokerClient, voice: VoiceClient, registry: CallRegistry) -> Self {
        Self {
            broker,
            voice,
            registry,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        Ok(Self::new(
            BrokerClient::from_config(client.clone(), config)?,
            VoiceClient::from_config(client, config),
            CallRegistry::new(config.call_history_limit),
        ))
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    /// Bootstrap both broker sessions and return Session A's answer.
    ///
    /// Any error here aborts the call before anything is handed off. Broker
    /// sessions created before the failure are left for the broker to expire.
    pub async fn start_call(
        &self,
        offer_sdp: String,
        caller_params: Vec<(String, String)>,
    ) -> Result<CallAnswer> {
        let call_id = format!("call_{}", Uuid::new_v4());
        let span = tracing::info_span!("call", call_id = %call_id);

        self.bootstrap(call_id, offer_sdp, caller_params)
            .instrument(span)
            .await
    }

    async fn bootstrap(
        &self,
        call_id: String,
        offer_sdp: String,
        caller_params: Vec<(String, String)>,
    ) -> Result<CallAnswer> {
        tracing::info!(offer_bytes = offer_sdp.len(), "Incoming call");

        let session_a = self.broker.create_session(false).await?;
        let answer = publish_expecting_sdp(
            &session_a,
            TracksRequest::with_offer(
                SessionDescription::offer(offer_sdp),
                vec![TrackSpec::local_audio(USER_MIC_TRACK, Some(USER_MIC_MID))],
            ),
        )
        .await?;
        tracing::info!(session_a = session_a.id(), "✓ Session A answered caller offer");

        let session_b = self.broker.create_session(true).await?;

        self.registry
            .register(&call_id, session_a.id(), session_b.id())
            .await;

        let exchange = Exchange {
            call_id: call_id.clone(),
            session_a,
            session_b,
            voice: self.voice.clone(),
            registry: self.registry.clone(),
            caller_params,
        };
        tokio::spawn(exchange.run().instrument(tracing::Span::current()));

        Ok(CallAnswer { call_id, answer })
    }
}

/// Negotiate a track batch and validate the result. A session description is
/// required whenever the batch publishes a bidirectional local track; relay
/// batches may be satisfied over the existing transport without one.
async fn publish(
    session: &BrokerSession,
    request: &TracksRequest,
) -> Result<Option<SessionDescription>> {
    let result = session.new_tracks(request).await?;
    validate(&result, request.expects_sdp())?;
    Ok(result.session_description)
}

async fn publish_expecting_sdp(
    session: &BrokerSession,
    request: TracksRequest,
) -> Result<SessionDescription> {
    publish(session, &request)
        .await?
        .ok_or_else(|| ValidationError::MissingSdp.into())
}

async fn publish_relay(session: &BrokerSession, track: TrackSpec) -> Result<()> {
    publish(session, &TracksRequest::new(vec![track])).await?;
    Ok(())
}

/// Detached half of a call: AI negotiation and cross-session relay
struct Exchange {
    call_id: String,
    session_a: BrokerSession,
    session_b: BrokerSession,
    voice: VoiceClient,
    registry: CallRegistry,
    caller_params: Vec<(String, String)>,
}

impl Exchange {
    async fn run(self) {
        match self.drive().await {
            Ok(()) => {
                self.registry
                    .advance(&self.call_id, ExchangeStage::Connected)
                    .await;
                tracing::info!("✓ Exchange completed, media path wired");
            }
            Err(e) => {
                tracing::error!("✗ Exchange failed: {}", e);
                self.registry.fail(&self.call_id, e.to_string()).await;
            }
        }
    }

    async fn stage(&self, stage: ExchangeStage) {
        tracing::debug!(?stage, "exchange stage");
        self.registry.advance(&self.call_id, stage).await;
    }

    async fn drive(&self) -> Result<()> {
        self.stage(ExchangeStage::AwaitingAiTrack).await;
        let offer = publish_expecting_sdp(
            &self.session_b,
            TracksRequest::new(vec![TrackSpec::local_audio(AI_VOICE_TRACK, None)]),
        )
        .await?;

        self.stage(ExchangeStage::AwaitingAiAnswer).await;
        let answer = self.voice.negotiate(&self.caller_params, &offer).await?;

        self.stage(ExchangeStage::AwaitingRenegotiation).await;
        self.session_b.renegotiate(&answer).await?;
        tracing::info!(session_b = self.session_b.id(), "✓ AI leg negotiated");

        // Each relay references a track the other session published earlier,
        // so AI audio into A must be wired before user audio into B.
        self.stage(ExchangeStage::RelayingAiAudio).await;
        publish_relay(
            &self.session_a,
            TrackSpec::remote(self.session_b.id(), AI_VOICE_TRACK, "#user-mic"),
        )
        .await?;

        self.stage(ExchangeStage::RelayingUserAudio).await;
        publish_relay(
            &self.session_b,
            TrackSpec::remote(self.session_a.id(), USER_MIC_TRACK, "#ai-generated-voice"),
        )
        .await?;

        Ok(())
    }
}
