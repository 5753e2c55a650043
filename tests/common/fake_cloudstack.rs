//! In-process fake CloudStack server.
//!
//! Serves scripted JSON replies in FIFO order, records every command and its
//! decoded query parameters, and checks each request's signature against the
//! canonical signing rules. Used to drive the driver and task tests without
//! a real endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use tracing_subscriber::EnvFilter;

use cumulus::{ApiParams, build_canonical_query, sign_canonical};

static TRACING: Once = Once::new();

/// Installs a fmt subscriber once per test binary so the driver's log events
/// show up under `--nocapture`; filtering follows `RUST_LOG`.
fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// One scripted reply.
struct Reply {
    status: u16,
    body: String,
}

#[derive(Default)]
struct ServerState {
    secret: String,
    replies: Mutex<VecDeque<Reply>>,
    default_reply: Mutex<Option<String>>,
    commands: Mutex<Vec<String>>,
    queries: Mutex<Vec<ApiParams>>,
    signature_failures: Mutex<Vec<String>>,
}

/// Handle to a running fake server.
pub struct FakeCloudStack {
    base_url: String,
    state: Arc<ServerState>,
}

impl FakeCloudStack {
    /// Starts the server on an ephemeral local port.
    pub async fn start(secret: &str) -> Self {
        init_tracing();
        let state = Arc::new(ServerState {
            secret: secret.to_owned(),
            ..ServerState::default()
        });
        let app = Router::new()
            .route("/", get(handle))
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|err| panic!("bind fake server: {err}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|err| panic!("local addr: {err}"));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Base URL clients should be configured with.
    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    /// Queues a 200 reply with `body`.
    pub fn script_ok(&self, body: &str) {
        self.script(200, body);
    }

    /// Queues a reply with an explicit status code.
    pub fn script(&self, status: u16, body: &str) {
        if let Ok(mut replies) = self.state.replies.lock() {
            replies.push_back(Reply {
                status,
                body: body.to_owned(),
            });
        }
    }

    /// Body served once the scripted replies run out.
    pub fn set_default_reply(&self, body: &str) {
        if let Ok(mut default_reply) = self.state.default_reply.lock() {
            *default_reply = Some(body.to_owned());
        }
    }

    /// Commands observed so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.state
            .commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }

    /// Decoded query parameters of every request, in arrival order.
    pub fn queries(&self) -> Vec<ApiParams> {
        self.state
            .queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    /// Commands whose signature did not verify.
    pub fn signature_failures(&self) -> Vec<String> {
        self.state
            .signature_failures
            .lock()
            .map(|failures| failures.clone())
            .unwrap_or_default()
    }
}

async fn handle(
    State(state): State<Arc<ServerState>>,
    RawQuery(raw): RawQuery,
) -> (StatusCode, String) {
    let params = parse_query(raw.as_deref().unwrap_or_default());
    let command = params.get("command").cloned().unwrap_or_default();

    let mut unsigned = params.clone();
    let provided = unsigned.remove("signature").unwrap_or_default();
    let expected = sign_canonical(&state.secret, &build_canonical_query(&unsigned))
        .unwrap_or_else(|err| panic!("sign: {err}"));
    if provided != expected {
        if let Ok(mut failures) = state.signature_failures.lock() {
            failures.push(command.clone());
        }
    }

    if let Ok(mut commands) = state.commands.lock() {
        commands.push(command);
    }
    if let Ok(mut queries) = state.queries.lock() {
        queries.push(params);
    }

    if let Some(reply) = state
        .replies
        .lock()
        .ok()
        .and_then(|mut replies| replies.pop_front())
    {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
        return (status, reply.body);
    }
    let fallback = state
        .default_reply
        .lock()
        .ok()
        .and_then(|default_reply| default_reply.clone())
        .unwrap_or_else(|| String::from("{}"));
    (StatusCode::OK, fallback)
}

/// Decodes an `application/x-www-form-urlencoded` query string.
fn parse_query(raw: &str) -> ApiParams {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (form_unescape(name), form_unescape(value)),
            None => (form_unescape(pair), String::new()),
        })
        .collect()
}

fn form_unescape(escaped: &str) -> String {
    let bytes = escaped.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut cursor = 0;
    while cursor < bytes.len() {
        match bytes.get(cursor) {
            Some(b'+') => {
                decoded.push(b' ');
                cursor += 1;
            }
            Some(b'%') => {
                let hex: Option<u8> = bytes
                    .get(cursor + 1..cursor + 3)
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok());
                match hex {
                    Some(byte) => {
                        decoded.push(byte);
                        cursor += 3;
                    }
                    None => {
                        decoded.push(b'%');
                        cursor += 1;
                    }
                }
            }
            Some(byte) => {
                decoded.push(*byte);
                cursor += 1;
            }
            None => break,
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
