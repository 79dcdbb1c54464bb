use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tp_core::socketio::{
    self, EnginePacket, Handshake, PacketError, SocketPacket, DEFAULT_MAX_PACKET_BYTES,
    DEFAULT_PING_INTERVAL_MS, DEFAULT_PING_TIMEOUT_MS, ENGINE_IO_VERSION, SOCKET_IO_PATH,
};
use tp_core::{ClientEvent, ServerEvent};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;

const OUTBOUND_CAPACITY: usize = 64;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid socket url: {0}")]
    Url(String),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("server rejected connection: {0}")]
    Rejected(String),
    #[error("no traffic from server for {0:?}")]
    Timeout(Duration),
    #[error("connection closed by server")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub epoch: u64,
    pub kind: PushEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEventKind {
    Connected,
    Disconnected { reason: String },
    ConnectError(String),
    Server(ServerEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub url: Url,
    pub reconnect_max: Duration,
    pub max_packet_bytes: usize,
}

impl TransportSettings {
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Ok(Self {
            url: socket_url(&config.server_url)?,
            reconnect_max: config.reconnect_max,
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
        })
    }
}

pub fn socket_url(server_url: &Url) -> Result<Url, TransportError> {
    let mut url = server_url
        .join(SOCKET_IO_PATH.trim_start_matches('/'))
        .map_err(|err| TransportError::Url(err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TransportError::Url(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::Url(format!("cannot switch {server_url} to {scheme}")))?;
    url.set_query(Some(&format!("EIO={ENGINE_IO_VERSION}&transport=websocket")));
    Ok(url)
}

pub trait PushChannel {
    fn connected(&self) -> bool;
    fn connect(&mut self, force: bool);
    fn emit(&self, event: ClientEvent) -> bool;
    fn observe(&mut self, event: &PushEvent) -> bool;
}

/// Owner of the push channel. The `connected` flag is written only here.
pub struct PushTransport {
    settings: TransportSettings,
    events: mpsc::Sender<PushEvent>,
    epoch: u64,
    connected: bool,
    outbound: Option<mpsc::Sender<ClientEvent>>,
    task: Option<JoinHandle<()>>,
}

impl PushTransport {
    pub fn new(settings: TransportSettings, events: mpsc::Sender<PushEvent>) -> Self {
        Self {
            settings,
            events,
            epoch: 0,
            connected: false,
            outbound: None,
            task: None,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Open the push channel. Does nothing while connected unless `force`;
    /// a forced reconnect drops the running socket first.
    pub fn connect(&mut self, force: bool) {
        if self.connected && !force {
            return;
        }
        self.shutdown();
        self.epoch += 1;
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.outbound = Some(outbound_tx);
        info!(event = "push_connect", epoch = self.epoch, url = %self.settings.url, force);
        self.task = Some(tokio::spawn(run_socket(
            self.epoch,
            self.settings.clone(),
            self.events.clone(),
            outbound_rx,
        )));
    }

    pub fn emit(&self, event: ClientEvent) -> bool {
        if !self.connected {
            return false;
        }
        match &self.outbound {
            Some(outbound) => outbound.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Track connection state from a delivered event. Returns false for
    /// events of a superseded socket, which callers must discard.
    pub fn observe(&mut self, event: &PushEvent) -> bool {
        if event.epoch != self.epoch {
            return false;
        }
        match &event.kind {
            PushEventKind::Connected => self.connected = true,
            PushEventKind::Disconnected { .. } | PushEventKind::ConnectError(_) => {
                self.connected = false
            }
            PushEventKind::Server(_) => {}
        }
        true
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.outbound = None;
        self.connected = false;
    }
}

impl PushChannel for PushTransport {
    fn connected(&self) -> bool {
        PushTransport::connected(self)
    }

    fn connect(&mut self, force: bool) {
        PushTransport::connect(self, force)
    }

    fn emit(&self, event: ClientEvent) -> bool {
        PushTransport::emit(self, event)
    }

    fn observe(&mut self, event: &PushEvent) -> bool {
        PushTransport::observe(self, event)
    }
}

impl Drop for PushTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current + current).min(max)
}

async fn run_socket(
    epoch: u64,
    settings: TransportSettings,
    events: mpsc::Sender<PushEvent>,
    mut outbound: mpsc::Receiver<ClientEvent>,
) {
    let send = |kind: PushEventKind| {
        let events = events.clone();
        async move { events.send(PushEvent { epoch, kind }).await.is_ok() }
    };
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let socket = match connect_async(settings.url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(err) => {
                warn!(event = "push_connect_error", epoch, error = %err);
                if !send(PushEventKind::ConnectError(err.to_string())).await {
                    return;
                }
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff, settings.reconnect_max);
                continue;
            }
        };
        backoff = INITIAL_BACKOFF;

        let reason = match run_session(epoch, &settings, socket, &events, &mut outbound).await {
            Ok(()) => "closed".to_string(),
            Err(err) => err.to_string(),
        };
        warn!(event = "push_disconnected", epoch, reason = %reason);
        if !send(PushEventKind::Disconnected { reason }).await {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff, settings.reconnect_max);
    }
}

async fn run_session(
    epoch: u64,
    settings: &TransportSettings,
    socket: Socket,
    events: &mpsc::Sender<PushEvent>,
    outbound: &mut mpsc::Receiver<ClientEvent>,
) -> Result<(), TransportError> {
    let (mut writer, mut reader) = socket.split();
    let mut liveness = Duration::from_millis(DEFAULT_PING_INTERVAL_MS + DEFAULT_PING_TIMEOUT_MS);
    let idle = tokio::time::sleep(liveness);
    tokio::pin!(idle);
    let mut joined = false;

    let deliver = |kind: PushEventKind| async move {
        events
            .send(PushEvent { epoch, kind })
            .await
            .map_err(|_| TransportError::Closed)
    };

    loop {
        tokio::select! {
            frame = reader.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return Err(err.into()),
                };
                idle.as_mut().reset(Instant::now() + liveness);
                let packet = match socketio::decode_packet(&text, settings.max_packet_bytes) {
                    Ok(packet) => packet,
                    Err(err) => {
                        warn!(event = "push_decode_error", epoch, error = %err);
                        continue;
                    }
                };
                match packet {
                    EnginePacket::Open(handshake) => {
                        liveness = handshake_window(&handshake);
                        idle.as_mut().reset(Instant::now() + liveness);
                        debug!(event = "push_open", epoch, sid = %handshake.sid, liveness_ms = liveness.as_millis() as u64);
                        writer.send(Message::Text(socketio::encode_connect())).await?;
                    }
                    EnginePacket::Ping(data) => {
                        writer.send(Message::Text(socketio::encode_pong(&data))).await?;
                    }
                    EnginePacket::Close => return Ok(()),
                    EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
                    EnginePacket::Message(SocketPacket::Connect { sid }) => {
                        joined = true;
                        info!(event = "push_connected", epoch, sid = sid.as_deref().unwrap_or_default());
                        deliver(PushEventKind::Connected).await?;
                        let frame = socketio::encode_event(&ClientEvent::RequestStatus, settings.max_packet_bytes)?;
                        writer.send(Message::Text(frame)).await?;
                    }
                    EnginePacket::Message(SocketPacket::ConnectError { message }) => {
                        deliver(PushEventKind::ConnectError(message.clone())).await?;
                        return Err(TransportError::Rejected(message));
                    }
                    EnginePacket::Message(SocketPacket::Disconnect) => return Ok(()),
                    EnginePacket::Message(packet) => match packet.into_server_event() {
                        Some(Ok(event)) => deliver(PushEventKind::Server(event)).await?,
                        Some(Err(err)) => warn!(event = "push_event_error", epoch, error = %err),
                        None => {}
                    },
                }
            }
            maybe_event = outbound.recv(), if joined => {
                let Some(event) = maybe_event else {
                    return Ok(());
                };
                match socketio::encode_event(&event, settings.max_packet_bytes) {
                    Ok(frame) => writer.send(Message::Text(frame)).await?,
                    Err(err) => warn!(event = "push_encode_error", epoch, name = event.name(), error = %err),
                }
            }
            _ = &mut idle => {
                return Err(TransportError::Timeout(liveness));
            }
        }
    }
}

fn handshake_window(handshake: &Handshake) -> Duration {
    let window = handshake.liveness_window();
    if window.is_zero() {
        Duration::from_millis(DEFAULT_PING_INTERVAL_MS + DEFAULT_PING_TIMEOUT_MS)
    } else {
        window
    }
}
