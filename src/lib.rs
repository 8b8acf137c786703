//! Call bridge library
//!
//! Connects a browser WebRTC caller to a speech-capable AI endpoint through a
//! media broker: two broker sessions are negotiated per call and their audio
//! tracks relayed into each other.

pub mod broker;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http_server;
pub mod registry;
pub mod types;
pub mod validate;
pub mod voice;

pub use broker::{BrokerClient, BrokerSession};
pub use config::BridgeConfig;
pub use error::{BridgeError, ValidationError};
pub use exchange::{Bridge, CallAnswer};
pub use registry::{CallRecord, CallRegistry, ExchangeStage};
pub use types::{SessionDescription, TrackSpec, TracksRequest, TracksResult};
pub use validate::validate;
pub use voice::{merge_query, VoiceClient};
