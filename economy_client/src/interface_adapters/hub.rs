// Push-channel adapter: SignalR JSON hub protocol over a WebSocket.

use crate::domain::{ClientError, HubConnection, HubTransport, ReconnectPolicy};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Interval, MissedTickBehavior, interval, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

// Every hub frame ends with the ASCII record separator.
pub const RECORD_SEPARATOR: char = '\u{1e}';
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

const INVOCATION: u8 = 1;
const PING: u8 = 6;
const CLOSE: u8 = 7;

#[derive(Debug, Deserialize)]
pub struct HubFrame {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HubSignal {
    Message(String),
    Close(Option<String>),
    Ignore,
}

pub fn handshake_request() -> String {
    format!("{{\"protocol\":\"json\",\"version\":1}}{RECORD_SEPARATOR}")
}

pub fn ping_frame() -> String {
    format!("{{\"type\":{PING}}}{RECORD_SEPARATOR}")
}

// Split one WebSocket text message into its hub records.
pub fn split_records(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
}

// Handshake reply is `{}` on success or `{"error": "..."}`.
pub fn check_handshake(record: &str) -> Result<(), ClientError> {
    #[derive(Deserialize)]
    struct HandshakeReply {
        #[serde(default)]
        error: Option<String>,
    }

    let reply: HandshakeReply = serde_json::from_str(record)
        .map_err(|e| ClientError::Protocol(format!("malformed hub handshake: {e}")))?;
    match reply.error {
        Some(error) => Err(ClientError::Transport(format!("hub handshake rejected: {error}"))),
        None => Ok(()),
    }
}

pub fn decode_record(record: &str, event: &str) -> Result<HubSignal, ClientError> {
    let frame: HubFrame = serde_json::from_str(record)
        .map_err(|e| ClientError::Protocol(format!("malformed hub frame: {e}")))?;
    Ok(match frame.kind {
        INVOCATION if frame.target.as_deref() == Some(event) => {
            match frame.arguments.into_iter().next() {
                Some(Value::String(text)) => HubSignal::Message(text),
                Some(other) => HubSignal::Message(other.to_string()),
                None => HubSignal::Ignore,
            }
        }
        CLOSE => HubSignal::Close(frame.error),
        _ => HubSignal::Ignore,
    })
}

/// Connects to one hub endpoint and subscribes to a single named event.
#[derive(Debug, Clone)]
pub struct SignalRTransport {
    url: Url,
    event: String,
    keepalive: Duration,
}

impl SignalRTransport {
    pub fn new(hub_url: &str, event: impl Into<String>) -> Result<Self, ClientError> {
        let mut url = Url::parse(hub_url)
            .map_err(|e| ClientError::validation(format!("invalid hub url {hub_url}: {e}")))?;
        // Hub URLs are often written as http(s); the socket needs ws(s).
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::validation(format!(
                    "invalid hub url scheme: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::validation(format!("invalid hub url: {hub_url}")))?;
        Ok(Self {
            url,
            event: event.into(),
            keepalive: KEEPALIVE_INTERVAL,
        })
    }

    // Client ping cadence; the hub drops clients it has not heard from in a while.
    pub fn with_keepalive(mut self, every: Duration) -> Self {
        // Interval periods must be non-zero.
        self.keepalive = every.max(Duration::from_millis(1));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn ws_error(err: tokio_tungstenite::tungstenite::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

#[async_trait]
impl HubTransport for SignalRTransport {
    async fn connect(&self) -> Result<Box<dyn HubConnection>, ClientError> {
        let (mut socket, _response) = connect_async(self.url.as_str()).await.map_err(ws_error)?;
        socket
            .send(Message::Text(handshake_request().into()))
            .await
            .map_err(ws_error)?;

        // Records after the handshake reply may share its WebSocket message.
        let mut pending = VecDeque::new();
        let handshake = timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let mut records = split_records(text.as_str());
                        let Some(first) = records.next() else {
                            continue;
                        };
                        if let Err(e) = check_handshake(first) {
                            return Err(e);
                        }
                        pending.extend(records.map(str::to_string));
                        return Ok(());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(ClientError::Transport(
                            "hub closed during handshake".to_string(),
                        ));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(ws_error(e)),
                }
            }
        })
        .await
        .map_err(|_| ClientError::Transport("hub handshake timed out".to_string()))?;
        handshake?;

        debug!(url = %self.url, event = %self.event, "hub connected");
        let mut keepalive = interval(self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so we don't ping on connect.
        keepalive.reset();

        Ok(Box::new(SignalRConnection {
            socket,
            event: self.event.clone(),
            pending,
            keepalive,
        }))
    }
}

struct SignalRConnection {
    socket: Socket,
    event: String,
    // Records already read but not yet delivered, oldest first.
    pending: VecDeque<String>,
    keepalive: Interval,
}

impl SignalRConnection {
    // Returns Some when a record ends the wait: a message or a close.
    fn drain_pending(&mut self) -> Option<Result<Option<String>, ClientError>> {
        while let Some(record) = self.pending.pop_front() {
            match decode_record(&record, &self.event) {
                Ok(HubSignal::Message(text)) => return Some(Ok(Some(text))),
                Ok(HubSignal::Close(Some(error))) => {
                    return Some(Err(ClientError::Transport(format!(
                        "hub closed connection: {error}"
                    ))));
                }
                Ok(HubSignal::Close(None)) => return Some(Ok(None)),
                Ok(HubSignal::Ignore) => trace!("ignoring hub frame"),
                Err(e) => warn!(error = %e, "skipping undecodable hub frame"),
            }
        }
        None
    }
}

#[async_trait]
impl HubConnection for SignalRConnection {
    async fn next_message(&mut self) -> Result<Option<String>, ClientError> {
        loop {
            if let Some(outcome) = self.drain_pending() {
                return outcome;
            }

            tokio::select! {
                _ = self.keepalive.tick() => {
                    self.socket
                        .send(Message::Text(ping_frame().into()))
                        .await
                        .map_err(ws_error)?;
                }
                incoming = self.socket.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        self.pending
                            .extend(split_records(text.as_str()).map(str::to_string));
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ws_error(e)),
                },
            }
        }
    }
}

/// Fixed delay schedule; gives up once the schedule is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReconnect {
    delays: Vec<Duration>,
}

impl ScheduledReconnect {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }
}

impl Default for ScheduledReconnect {
    // Matches the stock hub client retry schedule.
    fn default() -> Self {
        Self::new(vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(10),
            Duration::from_secs(30),
        ])
    }
}

impl ReconnectPolicy for ScheduledReconnect {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.delays.get(attempt as usize).copied()
    }
}
