use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tejimola_core::clock::{SystemClock, TimingSource};
use tejimola_core::config::SimConfig;
use tejimola_core::engine::GameEngine;
use tejimola_core::server_protocol::{parse_client_message, Encounter, ParsedClientMessage};
use tejimola_core::server_utils::{
    clamp_move_delta, normalize_damage, normalize_seed, normalize_stage_name,
};
use tejimola_core::world::{boss_arena_by_name, stealth_stage_by_name};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct SessionContext {
    tx: mpsc::Sender<OutboundMessage>,
    engine: GameEngine,
}

struct ServerState {
    config: SimConfig,
    clock: Arc<dyn TimingSource>,
    sessions: HashMap<String, SessionContext>,
}

impl ServerState {
    fn new(config: SimConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
            sessions: HashMap::new(),
        }
    }

    fn new_engine(&self, seed: u32) -> GameEngine {
        GameEngine::new(self.config.clone(), Arc::clone(&self.clock), seed)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let config = match std::env::var("TEJIMOLA_CONFIG").map(PathBuf::from) {
        Ok(path) => match SimConfig::load(&path) {
            Ok(config) => {
                info!(path = %path.display(), "config loaded");
                config
            }
            Err(error) => {
                error!(path = %path.display(), %error, "config rejected");
                std::process::exit(2);
            }
        },
        Err(_) => SimConfig::default(),
    };

    let state = Arc::new(Mutex::new(ServerState::new(config)));
    start_tick_loop(state.clone()).await;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%bind_addr, %error, "failed to bind server socket");
            std::process::exit(1);
        }
    };

    info!(port, "listening");
    if let Err(error) = axum::serve(listener, app).await {
        error!(%error, "server runtime failed");
        std::process::exit(1);
    }
}

async fn healthz(State(state): State<SharedState>) -> impl IntoResponse {
    let sessions = state.lock().await.sessions.len();
    Json(json!({ "ok": true, "sessions": sessions }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let session_id = make_session_id();
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        let engine = guard.new_engine(rand::random::<u32>());
        let tick_rate = guard.config.tick_rate;
        guard.sessions.insert(
            session_id.clone(),
            SessionContext {
                tx: tx.clone(),
                engine,
            },
        );
        send_to_session(
            &mut guard,
            &session_id,
            &json!({
                "type": "welcome",
                "sessionId": session_id,
                "tickRate": tick_rate,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }
    info!(session = %session_id, "session opened");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &session_id, raw.as_str()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = std::str::from_utf8(&raw) {
                    handle_client_message(&state, &session_id, text).await;
                } else {
                    send_error(&state, &session_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.lock().await.sessions.remove(&session_id);
    info!(session = %session_id, "session closed");
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, session_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error(state, session_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    let reply = apply_message(&mut guard, session_id, message);
    match reply {
        Ok(Some(payload)) => {
            send_to_session(&mut guard, session_id, &payload, QueuePolicy::DropOnFull)
        }
        Ok(None) => {}
        Err(reason) => {
            debug!(session = %session_id, reason, "client message rejected");
            send_to_session(
                &mut guard,
                session_id,
                &error_payload(reason),
                QueuePolicy::DropOnFull,
            );
        }
    }
}

/// Applies one client message to the session's engine. `Ok` may carry a
/// direct reply; `Err` carries the reason sent back to the client.
fn apply_message(
    state: &mut ServerState,
    session_id: &str,
    message: ParsedClientMessage,
) -> Result<Option<Value>, &'static str> {
    if let ParsedClientMessage::Start {
        seed: Some(seed), ..
    } = &message
    {
        let seed = normalize_seed(Some(*seed)).unwrap_or_default();
        let engine = state.new_engine(seed);
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.engine = engine;
        }
    }

    let Some(session) = state.sessions.get_mut(session_id) else {
        return Err("session not found");
    };
    let engine = &mut session.engine;

    match message {
        ParsedClientMessage::Start {
            encounter, stage, ..
        } => {
            let stage = normalize_stage_name(stage.as_deref(), encounter);
            match encounter {
                Encounter::Rhythm => {
                    if let Err(error) = engine.start_rhythm() {
                        warn!(session = %session_id, %error, "rhythm start rejected");
                        return Err("rhythm sequence could not start");
                    }
                }
                Encounter::Stealth => {
                    let stage = stealth_stage_by_name(&stage).ok_or("unknown stage")?;
                    engine.start_stealth(&stage);
                }
                Encounter::Boss => {
                    let arena = boss_arena_by_name(&stage).ok_or("unknown stage")?;
                    engine.start_boss(&arena);
                }
            }
            info!(session = %session_id, ?encounter, %stage, seed = engine.seed, "encounter started");
            Ok(None)
        }
        ParsedClientMessage::Press { key } => {
            engine.press(key);
            Ok(None)
        }
        ParsedClientMessage::VisionChoice { index } => {
            if engine.resolve_vision_choice(index) {
                Ok(None)
            } else {
                Err("no vision pending")
            }
        }
        ParsedClientMessage::Move { dx, dy } => {
            engine.move_player(clamp_move_delta(dx, dy));
            Ok(None)
        }
        ParsedClientMessage::Hide => {
            if engine.enter_hiding_spot() {
                Ok(None)
            } else {
                Err("no hiding spot in reach")
            }
        }
        ParsedClientMessage::Unhide => {
            engine.exit_hiding_spot();
            Ok(None)
        }
        ParsedClientMessage::CollectOrb => {
            engine.collect_spirit_orb();
            Ok(None)
        }
        ParsedClientMessage::UseOrb => {
            if engine.use_spirit_orb() {
                Ok(None)
            } else {
                Err("spirit orb not usable now")
            }
        }
        ParsedClientMessage::DamageBoss { amount } => {
            let amount = normalize_damage(amount, engine.boss().max_health());
            engine.damage_boss(amount);
            Ok(None)
        }
        ParsedClientMessage::Pause { paused } => {
            engine.set_paused(paused);
            Ok(None)
        }
        ParsedClientMessage::Stop { encounter } => {
            match encounter {
                Some(Encounter::Rhythm) => engine.stop_rhythm(),
                Some(Encounter::Stealth) => engine.stop_stealth(),
                Some(Encounter::Boss) => engine.stop_boss(),
                None => engine.stop_all(),
            }
            Ok(None)
        }
        ParsedClientMessage::Ping { t } => Ok(Some(json!({
            "type": "pong",
            "t": t,
            "serverTime": engine.now(),
        }))),
    }
}

async fn start_tick_loop(state: SharedState) {
    let tick_seconds = state.lock().await.config.tick_seconds();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs_f32(tick_seconds));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_sessions(&mut guard, tick_seconds);
        }
    });
}

fn tick_sessions(state: &mut ServerState, dt: f32) {
    let mut failed_sessions = Vec::new();
    for (session_id, session) in state.sessions.iter_mut() {
        session.engine.step(dt);
        let snapshot = session.engine.build_snapshot(true);
        let payload = json!({
            "type": "state",
            "snapshot": snapshot,
        });
        if let Err(mpsc::error::TrySendError::Closed(_)) = session
            .tx
            .try_send(OutboundMessage::Text(payload.to_string()))
        {
            failed_sessions.push(session_id.clone());
        }
    }
    for session_id in failed_sessions {
        state.sessions.remove(&session_id);
        debug!(session = %session_id, "dropped session with closed channel");
    }
}

fn send_to_session(
    state: &mut ServerState,
    session_id: &str,
    message: &Value,
    policy: QueuePolicy,
) {
    let send_failed = state
        .sessions
        .get(session_id)
        .map(|session| {
            session
                .tx
                .try_send(OutboundMessage::Text(message.to_string()))
                .is_err()
        })
        .unwrap_or(false);
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        if let Some(session) = state.sessions.remove(session_id) {
            let _ = session.tx.try_send(OutboundMessage::Close {
                code: 1013,
                reason: "send queue overflow".to_string(),
            });
        }
    }
}

async fn send_error(state: &SharedState, session_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_session(
        &mut guard,
        session_id,
        &error_payload(message),
        QueuePolicy::DropOnFull,
    );
}

fn error_payload(message: &str) -> Value {
    json!({
        "type": "error",
        "message": message,
    })
}

fn make_session_id() -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("session_{seq}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tejimola_core::types::BossPhase;

    fn state_with_session() -> (ServerState, String, mpsc::Receiver<OutboundMessage>) {
        let mut state = ServerState::new(SimConfig::default());
        let (tx, rx) = mpsc::channel(16);
        let engine = state.new_engine(7);
        state
            .sessions
            .insert("s1".to_string(), SessionContext { tx, engine });
        (state, "s1".to_string(), rx)
    }

    fn apply(state: &mut ServerState, raw: &str) -> Result<Option<Value>, &'static str> {
        let message = parse_client_message(raw).expect("test message should parse");
        apply_message(state, "s1", message)
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(make_session_id(), make_session_id());
    }

    #[test]
    fn start_boss_uses_default_arena() {
        let (mut state, id, _rx) = state_with_session();
        assert!(apply(&mut state, r#"{"type":"start","encounter":"boss"}"#).is_ok());
        let engine = &state.sessions[&id].engine;
        assert!(engine.boss().is_active());
        assert_eq!(engine.boss().phase(), BossPhase::Navigate);
    }

    #[test]
    fn start_rejects_unknown_stage() {
        let (mut state, _id, _rx) = state_with_session();
        let result = apply(
            &mut state,
            r#"{"type":"start","encounter":"stealth","stage":"attic"}"#,
        );
        assert_eq!(result, Err("unknown stage"));
    }

    #[test]
    fn start_with_seed_rebuilds_engine() {
        let (mut state, id, _rx) = state_with_session();
        assert!(apply(
            &mut state,
            r#"{"type":"start","encounter":"rhythm","seed":99}"#
        )
        .is_ok());
        let engine = &state.sessions[&id].engine;
        assert_eq!(engine.seed, 99);
        assert!(engine.rhythm().is_active());
    }

    #[test]
    fn vision_choice_without_vision_is_rejected() {
        let (mut state, _id, _rx) = state_with_session();
        let result = apply(&mut state, r#"{"type":"vision_choice","index":0}"#);
        assert_eq!(result, Err("no vision pending"));
    }

    #[test]
    fn ping_replies_with_pong() {
        let (mut state, _id, _rx) = state_with_session();
        let reply = apply(&mut state, r#"{"type":"ping","t":3.5}"#)
            .expect("ping should be accepted")
            .expect("ping should reply");
        assert_eq!(reply["type"], "pong");
        assert_eq!(reply["t"], 3.5);
    }

    #[test]
    fn tick_sends_snapshot_and_drops_closed_sessions() {
        let (mut state, id, mut rx) = state_with_session();
        tick_sessions(&mut state, 1.0 / 60.0);
        match rx.try_recv() {
            Ok(OutboundMessage::Text(payload)) => {
                let value: Value = serde_json::from_str(&payload).expect("snapshot is json");
                assert_eq!(value["type"], "state");
                assert_eq!(value["snapshot"]["tick"], 1);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }

        drop(rx);
        tick_sessions(&mut state, 1.0 / 60.0);
        assert!(!state.sessions.contains_key(&id));
    }
}
