//! Phoenix channel push session with heartbeat and auto-reconnect.
//!
//! Connects to the vendor socket, joins `gates:{id}` and `devices:{id}`
//! for the configured topology, and streams parsed state updates through a
//! [`tokio::sync::broadcast`] channel. The heartbeat and the
//! selected-parameter re-subscription run as arms of the same `select!`
//! as the reader, so they die with the connection. Reconnects use a fixed
//! delay and never give up.
//!
//! # Example
//!
//! ```rust,ignore
//! use compit_api::websocket::{PushConfig, PushHandle, Subscription};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PushConfig::new(url::Url::parse(compit_api::DEFAULT_WS_URL)?);
//! let handle = PushHandle::spawn(config, token, subscription, CancellationToken::new());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//!
//! handle.shutdown().await;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::StateDelta;

/// Production socket endpoint (Phoenix serializer v2).
pub const DEFAULT_WS_URL: &str = "wss://inext.compit.pl/socket/websocket?vsn=2.0.0";

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RESUBSCRIBE_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Parked deadline for the re-subscription timer while not listening.
const IDLE_TIMER: Duration = Duration::from_secs(86_400);

// ── Phoenix events ───────────────────────────────────────────────────

const PHOENIX_TOPIC: &str = "phoenix";
const EVT_JOIN: &str = "phx_join";
const EVT_REPLY: &str = "phx_reply";
const EVT_ERROR: &str = "phx_error";
const EVT_CLOSE: &str = "phx_close";
const EVT_HEARTBEAT: &str = "heartbeat";
const EVT_SELECTED_PARAMS: &str = "selected_params";
const EVT_STATE_UPDATE: &str = "state_update";
const EVT_SELECTED_PARAMS_UPDATE: &str = "selected_params_update";

// ── Frames ───────────────────────────────────────────────────────────

/// A Phoenix v2 frame: `[join_ref, ref, topic, event, payload]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhoenixMessage {
    pub join_ref: Option<String>,
    pub msg_ref: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

/// Positional wire form; serde encodes tuple structs as arrays.
#[derive(Serialize, Deserialize)]
struct Frame(Option<String>, Option<String>, String, String, Value);

impl PhoenixMessage {
    pub fn encode(&self) -> Result<String, Error> {
        let frame = Frame(
            self.join_ref.clone(),
            self.msg_ref.clone(),
            self.topic.clone(),
            self.event.clone(),
            self.payload.clone(),
        );
        serde_json::to_string(&frame).map_err(|e| Error::Protocol(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, Error> {
        let Frame(join_ref, msg_ref, topic, event, payload) =
            serde_json::from_str(text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.to_owned(),
            })?;
        Ok(Self {
            join_ref,
            msg_ref,
            topic,
            event,
            payload,
        })
    }

    fn reply_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }
}

pub fn gate_topic(gate_id: u64) -> String {
    format!("gates:{gate_id}")
}

pub fn device_topic(device_id: u64) -> String {
    format!("devices:{device_id}")
}

fn topic_id(topic: &str, prefix: &str) -> Option<u64> {
    topic.strip_prefix(prefix)?.parse().ok()
}

// ── Configuration ────────────────────────────────────────────────────

/// Socket endpoint and timer settings for a push session.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: Url,
    pub heartbeat_interval: Duration,
    /// Minimum gap between selected-parameter requests.
    pub resubscribe_interval: Duration,
    /// Fixed wait between a dropped connection and the next attempt.
    pub reconnect_delay: Duration,
}

impl PushConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            resubscribe_interval: DEFAULT_RESUBSCRIBE_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Channels to join and the parameter group to request per device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subscription {
    pub gate_ids: Vec<u64>,
    pub device_ids: Vec<u64>,
    /// Codes of every exposed parameter, keyed by device id.
    pub selected_params: HashMap<u64, Vec<String>>,
}

impl Subscription {
    fn topics(&self) -> impl Iterator<Item = String> + '_ {
        self.gate_ids
            .iter()
            .map(|id| gate_topic(*id))
            .chain(self.device_ids.iter().map(|id| device_topic(*id)))
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// Connection lifecycle as observed by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Disconnected,
    Connecting,
    /// Join frames sent, acknowledgements outstanding.
    Joined,
    Listening,
}

/// Whether a delta came from a state push or a selected-params answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    State,
    SelectedParams,
}

/// A device state delta received over the socket.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub kind: UpdateKind,
    /// Absent when neither the payload nor the topic names a gate.
    pub gate_id: Option<u64>,
    pub device_id: u64,
    pub state: StateDelta,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connected,
    Listening,
    StateUpdate(StateUpdate),
    Disconnected { reason: String },
}

#[derive(Debug, Deserialize)]
struct UpdatePayload {
    #[serde(default)]
    gate_id: Option<u64>,
    #[serde(default)]
    device_id: Option<u64>,
    #[serde(default)]
    state: StateDelta,
}

// ── Re-subscription throttle ─────────────────────────────────────────

/// Suppresses `selected_params` requests within `min_interval` of the
/// last request or the last confirmation, whichever is later.
#[derive(Debug, Clone)]
pub struct ResubscribeThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl ResubscribeThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval)
    }

    pub fn next_due(&self, now: Instant) -> Instant {
        self.last.map_or(now, |last| last + self.min_interval)
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn confirm(&mut self, now: Instant) {
        self.last = Some(self.last.map_or(now, |last| last.max(now)));
    }
}

// ── Per-connection protocol state ────────────────────────────────────

/// What the reader should do after an inbound frame.
#[derive(Debug, PartialEq)]
enum Inbound {
    Ignore,
    Listening,
    Update(StateUpdate),
}

/// Ref bookkeeping and frame interpretation for one connection.
#[derive(Debug)]
struct Session {
    next_ref: u64,
    /// ref → topic for joins not yet acknowledged.
    pending_joins: HashMap<String, String>,
    /// topic → join_ref for acknowledged channels.
    joined: HashMap<String, String>,
    pending_subscriptions: HashSet<String>,
    throttle: ResubscribeThrottle,
    listening: bool,
}

impl Session {
    fn new(resubscribe_interval: Duration) -> Self {
        Self {
            next_ref: 0,
            pending_joins: HashMap::new(),
            joined: HashMap::new(),
            pending_subscriptions: HashSet::new(),
            throttle: ResubscribeThrottle::new(resubscribe_interval),
            listening: false,
        }
    }

    fn take_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    fn join(&mut self, topic: String) -> PhoenixMessage {
        let msg_ref = self.take_ref();
        self.pending_joins.insert(msg_ref.clone(), topic.clone());
        PhoenixMessage {
            join_ref: Some(msg_ref.clone()),
            msg_ref: Some(msg_ref),
            topic,
            event: EVT_JOIN.into(),
            payload: json!({}),
        }
    }

    fn heartbeat(&mut self) -> PhoenixMessage {
        PhoenixMessage {
            join_ref: None,
            msg_ref: Some(self.take_ref()),
            topic: PHOENIX_TOPIC.into(),
            event: EVT_HEARTBEAT.into(),
            payload: json!({}),
        }
    }

    /// Selected-parameter requests for every joined device channel.
    fn selected_params(&mut self, subscription: &Subscription) -> Vec<PhoenixMessage> {
        let mut frames = Vec::new();
        for (device_id, codes) in &subscription.selected_params {
            let topic = device_topic(*device_id);
            let Some(join_ref) = self.joined.get(&topic).cloned() else {
                continue;
            };
            let msg_ref = self.take_ref();
            self.pending_subscriptions.insert(msg_ref.clone());
            frames.push(PhoenixMessage {
                join_ref: Some(join_ref),
                msg_ref: Some(msg_ref),
                topic,
                event: EVT_SELECTED_PARAMS.into(),
                payload: json!({ "params": codes }),
            });
        }
        frames
    }

    fn handle(&mut self, msg: PhoenixMessage, now: Instant) -> Result<Inbound, Error> {
        match msg.event.as_str() {
            EVT_REPLY => self.handle_reply(&msg, now),
            EVT_ERROR | EVT_CLOSE => Err(Error::Protocol(format!(
                "{} on channel {}",
                msg.event, msg.topic
            ))),
            EVT_STATE_UPDATE => Ok(parse_update(&msg, UpdateKind::State)
                .map_or(Inbound::Ignore, Inbound::Update)),
            EVT_SELECTED_PARAMS_UPDATE => {
                self.throttle.confirm(now);
                Ok(parse_update(&msg, UpdateKind::SelectedParams)
                    .map_or(Inbound::Ignore, Inbound::Update))
            }
            other => {
                tracing::trace!(event = other, topic = %msg.topic, "ignoring channel event");
                Ok(Inbound::Ignore)
            }
        }
    }

    fn handle_reply(&mut self, msg: &PhoenixMessage, now: Instant) -> Result<Inbound, Error> {
        let Some(msg_ref) = msg.msg_ref.as_deref() else {
            return Ok(Inbound::Ignore);
        };
        let ok = msg.reply_status() == Some("ok");

        if let Some(topic) = self.pending_joins.remove(msg_ref) {
            if !ok {
                return Err(Error::Protocol(format!(
                    "join rejected for {topic}: {}",
                    msg.payload
                )));
            }
            tracing::debug!(topic = %topic, "channel joined");
            self.joined.insert(topic, msg_ref.to_owned());
            if self.pending_joins.is_empty() && !self.listening {
                self.listening = true;
                return Ok(Inbound::Listening);
            }
        } else if self.pending_subscriptions.remove(msg_ref) {
            if ok {
                self.throttle.confirm(now);
            } else {
                tracing::warn!(topic = %msg.topic, payload = %msg.payload, "selected_params rejected");
            }
        }
        Ok(Inbound::Ignore)
    }
}

fn parse_update(msg: &PhoenixMessage, kind: UpdateKind) -> Option<StateUpdate> {
    let payload: UpdatePayload = match serde_json::from_value(msg.payload.clone()) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, topic = %msg.topic, "malformed update payload");
            return None;
        }
    };
    let device_id = payload
        .device_id
        .or_else(|| topic_id(&msg.topic, "devices:"))?;
    let gate_id = payload.gate_id.or_else(|| topic_id(&msg.topic, "gates:"));

    Some(StateUpdate {
        kind,
        gate_id,
        device_id,
        state: payload.state,
    })
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push session.
///
/// Call [`shutdown`](Self::shutdown) to cancel the background task and
/// wait for the socket to close.
pub struct PushHandle {
    events: broadcast::Sender<Arc<PushEvent>>,
    state: watch::Receiver<PushState>,
    subscription: watch::Sender<Subscription>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PushHandle {
    /// Spawn the session loop. The first connection attempt happens in the
    /// background; subscribe to the event receiver to consume updates.
    pub fn spawn(
        config: PushConfig,
        token: SecretString,
        subscription: Subscription,
        cancel: CancellationToken,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(PushState::Disconnected);
        let (subscription, subscription_rx) = watch::channel(subscription);

        let ctx = SessionContext {
            config,
            token,
            subscription: subscription_rx,
            events: events.clone(),
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(push_loop(ctx));

        Self {
            events,
            state,
            subscription,
            cancel,
            task,
        }
    }

    /// New receiver for session events. Slow consumers see `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.events.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<PushState> {
        self.state.clone()
    }

    /// Replace the channel set; applies to the next connection and the next
    /// selected-params request.
    pub fn set_subscription(&self, subscription: Subscription) {
        self.subscription.send_replace(subscription);
    }

    /// Cancel the session and wait for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "push task ended abnormally");
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

struct SessionContext {
    config: PushConfig,
    token: SecretString,
    subscription: watch::Receiver<Subscription>,
    events: broadcast::Sender<Arc<PushEvent>>,
    state: watch::Sender<PushState>,
    cancel: CancellationToken,
}

impl SessionContext {
    fn emit(&self, event: PushEvent) {
        // No receivers is fine.
        let _ = self.events.send(Arc::new(event));
    }
}

/// connect → join → listen → on drop, wait the fixed delay → reconnect.
async fn push_loop(ctx: SessionContext) {
    let mut attempt: u32 = 0;

    while !ctx.cancel.is_cancelled() {
        ctx.state.send_replace(PushState::Connecting);

        let reason = match run_connection(&ctx).await {
            Ok(()) => "connection closed".to_owned(),
            Err(e) => {
                tracing::warn!(error = %e, attempt, "push connection ended");
                e.to_string()
            }
        };
        ctx.state.send_replace(PushState::Disconnected);

        if ctx.cancel.is_cancelled() {
            break;
        }
        ctx.emit(PushEvent::Disconnected { reason });
        attempt = attempt.saturating_add(1);

        tracing::info!(
            delay_ms = u64::try_from(ctx.config.reconnect_delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            () = tokio::time::sleep(ctx.config.reconnect_delay) => {}
        }
    }

    ctx.state.send_replace(PushState::Disconnected);
    tracing::debug!("push loop exiting");
}

/// One connection: returns when the socket drops or the session is cancelled.
async fn run_connection(ctx: &SessionContext) -> Result<(), Error> {
    let url = &ctx.config.url;
    tracing::info!(url = %url, "connecting push socket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri).with_header(
        "Authorization",
        format!("Bearer {}", ctx.token.expose_secret()),
    );

    let connected = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Ok(()),
        r = tokio_tungstenite::connect_async(request) => r,
    };
    let (ws_stream, _response) = connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    tracing::info!("push socket connected");
    ctx.emit(PushEvent::Connected);

    let subscription = ctx.subscription.borrow().clone();
    let mut session = Session::new(ctx.config.resubscribe_interval);

    for topic in subscription.topics() {
        let frame = session.join(topic).encode()?;
        write.send(Message::text(frame)).await.map_err(send_error)?;
    }
    ctx.state.send_replace(PushState::Joined);

    if session.pending_joins.is_empty() {
        session.listening = true;
        ctx.state.send_replace(PushState::Listening);
        ctx.emit(PushEvent::Listening);
    }

    let hb = ctx.config.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + hb, hb);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let resubscribe = tokio::time::sleep_until(if session.listening {
        session.throttle.next_due(Instant::now())
    } else {
        Instant::now() + IDLE_TIMER
    });
    tokio::pin!(resubscribe);

    loop {
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        return Err(match frame {
                            Some(cf) => Error::WebSocketClosed {
                                code: cf.code.into(),
                                reason: cf.reason.as_str().to_owned(),
                            },
                            None => Error::WebSocketClosed {
                                code: 1005,
                                reason: "no status".into(),
                            },
                        });
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(send_error(e)),
                    None => return Ok(()),
                };

                let msg = match PhoenixMessage::decode(text.as_str()) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping undecodable frame");
                        continue;
                    }
                };

                let now = Instant::now();
                match session.handle(msg, now)? {
                    Inbound::Ignore => {}
                    Inbound::Listening => {
                        tracing::info!("all channels joined, listening");
                        ctx.state.send_replace(PushState::Listening);
                        ctx.emit(PushEvent::Listening);
                    }
                    Inbound::Update(update) => ctx.emit(PushEvent::StateUpdate(update)),
                }
                if session.listening {
                    resubscribe.as_mut().reset(session.throttle.next_due(now));
                }
            }
            _ = heartbeat.tick() => {
                let frame = session.heartbeat().encode()?;
                tracing::trace!("heartbeat");
                write.send(Message::text(frame)).await.map_err(send_error)?;
            }
            () = &mut resubscribe, if session.listening => {
                let now = Instant::now();
                if session.throttle.due(now) {
                    let current = ctx.subscription.borrow().clone();
                    for frame in session.selected_params(&current) {
                        write.send(Message::text(frame.encode()?)).await.map_err(send_error)?;
                    }
                    session.throttle.mark_sent(now);
                    tracing::debug!(devices = current.selected_params.len(), "selected params requested");
                }
                resubscribe.as_mut().reset(session.throttle.next_due(now));
            }
        }
    }
}

fn send_error(e: tungstenite::Error) -> Error {
    Error::WebSocketClosed {
        code: 1006,
        reason: e.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
