//! In-process fakes of the media broker and the AI endpoint, plus a harness
//! that runs the real bridge router against them.

use axum::{
    extract::{Path, RawQuery, State},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use call_bridge::{
    http_server::{router, AppState},
    Bridge, BridgeConfig, CallRecord,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const CALLER_OFFER: &str = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=offer-A\r\n";
pub const SESSION_A_ANSWER: &str = "v=0\r\no=- 2 2 IN IP4 0.0.0.0\r\ns=answer-A\r\n";
pub const SESSION_B_OFFER: &str = "v=0\r\no=- 3 3 IN IP4 0.0.0.0\r\ns=offer-B\r\n";
pub const AI_ANSWER: &str = "v=0\r\no=- 4 4 IN IP4 0.0.0.0\r\ns=answer-AI\r\n";

pub const APP_ID: &str = "app123";
pub const APP_TOKEN: &str = "token456";
pub const AI_KEY: &str = "sk-test";

/// One request seen by a fake
#[derive(Debug, Clone)]
pub struct Recorded {
    pub op: &'static str,
    pub session: String,
    pub query: String,
    pub authorization: String,
    pub content_type: String,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl Recorder {
    fn push(&self, call: Recorded) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    /// `(op, session)` pairs in arrival order
    pub fn ops(&self) -> Vec<(&'static str, String)> {
        self.calls()
            .into_iter()
            .map(|c| (c.op, c.session))
            .collect()
    }
}

/// Scripted broker behaviour
#[derive(Default)]
pub struct BrokerScript {
    /// Session-level error returned for Session A's initial publish
    pub session_a_error: Option<String>,
    /// Track-level error returned when Session A subscribes to the AI voice
    pub relay_error: Option<String>,
    /// Answer the second session creation with a malformed body
    pub break_second_session: bool,
    /// Hold Session B's AI track publish until notified
    pub gate_ai_track: Option<Arc<Notify>>,
    /// Answer the local publish on this session without a session description
    pub omit_sdp_for: Option<&'static str>,
    /// Drop the connection instead of answering renegotiate
    pub break_renegotiate: bool,
}

struct BrokerState {
    script: BrokerScript,
    recorder: Recorder,
    sessions: AtomicUsize,
}

fn header(headers: &HeaderMap, name: axum::http::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn create_session(
    State(state): State<Arc<BrokerState>>,
    Path(_app): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> axum::response::Response {
    let n = state.sessions.fetch_add(1, Ordering::SeqCst);
    let session_id = match n {
        0 => "sess-a".to_string(),
        1 => "sess-b".to_string(),
        n => format!("sess-{}", n),
    };

    state.recorder.push(Recorded {
        op: "create_session",
        session: session_id.clone(),
        query: query.unwrap_or_default(),
        authorization: header(&headers, AUTHORIZATION),
        content_type: header(&headers, CONTENT_TYPE),
        body: String::new(),
    });

    if n == 1 && state.script.break_second_session {
        return (StatusCode::OK, "<html>bad gateway</html>").into_response();
    }

    Json(json!({ "sessionId": session_id })).into_response()
}

async fn new_tracks(
    State(state): State<Arc<BrokerState>>,
    Path((_app, session_id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let first = &request["tracks"][0];
    let is_local = first["location"] == "local";

    if session_id == "sess-b" && is_local {
        if let Some(gate) = &state.script.gate_ai_track {
            gate.notified().await;
        }
    }

    state.recorder.push(Recorded {
        op: "new_tracks",
        session: session_id.clone(),
        query: query.unwrap_or_default(),
        authorization: header(&headers, AUTHORIZATION),
        content_type: header(&headers, CONTENT_TYPE),
        body,
    });

    if !is_local {
        if session_id == "sess-a" {
            if let Some(description) = &state.script.relay_error {
                return Json(json!({
                    "tracks": [{
                        "trackName": first["trackName"],
                        "mid": "",
                        "errorCode": "not_found",
                        "errorDescription": description
                    }]
                }));
            }
        }
        return Json(json!({
            "tracks": [{ "trackName": first["trackName"], "mid": "1" }]
        }));
    }

    if state.script.omit_sdp_for == Some(session_id.as_str()) {
        return Json(json!({
            "tracks": [{ "trackName": first["trackName"], "mid": "0" }]
        }));
    }

    if session_id == "sess-a" {
        if let Some(description) = &state.script.session_a_error {
            return Json(json!({
                "tracks": [],
                "errorCode": "session_error",
                "errorDescription": description
            }));
        }
        return Json(json!({
            "tracks": [{ "trackName": "user-mic", "mid": "0" }],
            "sessionDescription": { "type": "answer", "sdp": SESSION_A_ANSWER }
        }));
    }

    Json(json!({
        "tracks": [{ "trackName": "ai-generated-voice", "mid": "0" }],
        "sessionDescription": { "type": "offer", "sdp": SESSION_B_OFFER }
    }))
}

async fn renegotiate(
    State(state): State<Arc<BrokerState>>,
    Path((_app, session_id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    state.recorder.push(Recorded {
        op: "renegotiate",
        session: session_id,
        query: query.unwrap_or_default(),
        authorization: header(&headers, AUTHORIZATION),
        content_type: header(&headers, CONTENT_TYPE),
        body,
    });

    if state.script.break_renegotiate {
        // Aborts the connection task, the client sees a transport error
        panic!("renegotiate connection dropped");
    }

    Json(json!({}))
}

async fn ai_negotiate(
    State(recorder): State<Recorder>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    recorder.push(Recorded {
        op: "ai_negotiate",
        session: String::new(),
        query: query.unwrap_or_default(),
        authorization: header(&headers, AUTHORIZATION),
        content_type: header(&headers, CONTENT_TYPE),
        body,
    });
    (StatusCode::CREATED, AI_ANSWER)
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Address nothing listens on
async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub struct Harness {
    pub bridge_url: String,
    pub broker: Recorder,
    pub ai: Recorder,
    pub client: reqwest::Client,
}

impl Harness {
    pub async fn start(script: BrokerScript) -> Self {
        Self::start_with_ai(script, true).await
    }

    pub async fn start_with_ai(script: BrokerScript, ai_up: bool) -> Self {
        let broker = Recorder::default();
        let broker_state = Arc::new(BrokerState {
            script,
            recorder: broker.clone(),
            sessions: AtomicUsize::new(0),
        });
        let broker_app = Router::new()
            .route("/:app/sessions/new", post(create_session))
            .route("/:app/sessions/:session_id/tracks/new", post(new_tracks))
            .route("/:app/sessions/:session_id/renegotiate", put(renegotiate))
            .with_state(broker_state);
        let broker_addr = spawn(broker_app).await;

        let ai = Recorder::default();
        let ai_addr = if ai_up {
            let ai_app = Router::new()
                .route("/v1/realtime", post(ai_negotiate))
                .with_state(ai.clone());
            spawn(ai_app).await
        } else {
            closed_addr().await
        };

        let config = BridgeConfig::from_json(
            &json!({
                "ai_api_key": AI_KEY,
                "ai_endpoint": format!("http://{}/v1/realtime?model=default-model", ai_addr),
                "broker_base_url": format!("http://{}", broker_addr),
                "broker_app_id": APP_ID,
                "broker_app_token": APP_TOKEN,
                "stun_server": "stun:stun.example.com:3478"
            })
            .to_string(),
        )
        .unwrap();

        let bridge = Bridge::from_config(&config).unwrap();
        let bridge_addr = spawn(router(AppState::new(bridge, &config.stun_server))).await;

        Self {
            bridge_url: format!("http://{}", bridge_addr),
            broker,
            ai,
            client: reqwest::Client::new(),
        }
    }

    pub async fn call(&self, query: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/endpoint{}", self.bridge_url, query))
            .body(CALLER_OFFER)
            .send()
            .await
            .unwrap()
    }

    /// Poll the registry until the detached exchange finishes
    pub async fn wait_for_exchange(&self, call_id: &str) -> CallRecord {
        let url = format!("{}/calls/{}", self.bridge_url, call_id);
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let record: CallRecord = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .unwrap()
                    .json()
                    .await
                    .unwrap();
                if record.is_finished() {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("exchange did not finish in time")
    }
}
