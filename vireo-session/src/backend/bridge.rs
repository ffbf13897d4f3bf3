//! Backend for a player embedded in a separate, sandboxed surface.
//!
//! Everything goes through messages: commands are fire-and-forget, queries
//! carry a request id and are answered by a correlated reply, and events
//! stream back unprompted. One JSON object per line on byte streams.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use vireo_config::BridgeSettings;
use vireo_model::{BackendKind, PlaybackEvent};

use super::{BackendCore, Intent, PlaybackBackend};
use crate::error::{BackendError, BackendResult};

const MAX_LINE_BYTES: usize = 64 * 1024;

/// Command sent to the remote player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeCommand {
    Play,
    Pause,
    SetCurrentTime { seconds: f64 },
    GetCurrentTime { request_id: u64 },
    GetPaused { request_id: u64 },
}

impl From<Intent> for BridgeCommand {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Play => BridgeCommand::Play,
            Intent::Pause => BridgeCommand::Pause,
            Intent::Seek(seconds) => BridgeCommand::SetCurrentTime { seconds },
        }
    }
}

/// Value carried by a query reply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyValue {
    Paused(bool),
    Seconds(f64),
}

/// Message received from the remote player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BridgeMessage {
    Event(PlaybackEvent),
    Reply { request_id: u64, value: ReplyValue },
}

/// Outbound half of a bridge connection.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn send(&self, command: BridgeCommand) -> BackendResult<()>;
}

/// In-process transport over an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::Sender<BridgeCommand>,
}

impl ChannelTransport {
    pub fn new(outbound: mpsc::Sender<BridgeCommand>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl BridgeTransport for ChannelTransport {
    async fn send(&self, command: BridgeCommand) -> BackendResult<()> {
        self.outbound
            .send(command)
            .await
            .map_err(|_| BackendError::Disconnected)
    }
}

/// The player's side of an in-process bridge.
#[derive(Debug)]
pub struct ChannelPeer {
    pub commands: mpsc::Receiver<BridgeCommand>,
    pub messages: mpsc::Sender<BridgeMessage>,
}

/// Build an in-process bridge: the transport and inbound stream for the
/// backend, and the peer end for whatever plays the remote player.
pub fn channel_bridge(
    capacity: usize,
) -> (ChannelTransport, mpsc::Receiver<BridgeMessage>, ChannelPeer) {
    let capacity = capacity.max(1);
    let (command_tx, command_rx) = mpsc::channel(capacity);
    let (message_tx, message_rx) = mpsc::channel(capacity);
    (
        ChannelTransport::new(command_tx),
        message_rx,
        ChannelPeer {
            commands: command_rx,
            messages: message_tx,
        },
    )
}

/// Speak the bridge protocol as JSON lines over a byte stream pair.
///
/// Malformed inbound lines are logged and skipped. Both pump tasks stop on
/// end of stream, on write failure, or when `cancel` fires.
pub fn spawn_json_lines_bridge<R, W>(
    reader: R,
    writer: W,
    capacity: usize,
    cancel: CancellationToken,
) -> (ChannelTransport, mpsc::Receiver<BridgeMessage>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let capacity = capacity.max(1);
    let (command_tx, mut command_rx) = mpsc::channel::<BridgeCommand>(capacity);
    let (message_tx, message_rx) = mpsc::channel(capacity);

    let write_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut sink = FramedWrite::new(writer, LinesCodec::new());
        loop {
            let command = tokio::select! {
                _ = write_cancel.cancelled() => break,
                command = command_rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            let line = match serde_json::to_string(&command) {
                Ok(line) => line,
                Err(err) => {
                    warn!("[Bridge] Could not encode {:?}: {}", command, err);
                    continue;
                }
            };
            if let Err(err) = sink.send(line).await {
                warn!("[Bridge] Write failed, closing outbound: {}", err);
                break;
            }
        }
        debug!("[Bridge] Outbound pump stopped");
    });

    tokio::spawn(async move {
        let mut lines =
            FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next() => line,
            };
            let line = match line {
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!("[Bridge] Dropping line longer than {} bytes", MAX_LINE_BYTES);
                    continue;
                }
                Some(Err(LinesCodecError::Io(err))) => {
                    warn!("[Bridge] Read failed, closing inbound: {}", err);
                    break;
                }
                None => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BridgeMessage>(&line) {
                Ok(message) => {
                    if message_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!("[Bridge] Ignoring malformed message {:?}: {}", line, err),
            }
        }
        debug!("[Bridge] Inbound pump stopped");
    });

    (ChannelTransport::new(command_tx), message_rx)
}

type ReplyMap = Mutex<HashMap<u64, oneshot::Sender<ReplyValue>>>;

/// Backend for a remotely embedded player reached through a bridge.
pub struct RemoteBridgeBackend {
    core: Arc<BackendCore>,
    transport: Arc<dyn BridgeTransport>,
    replies: Arc<ReplyMap>,
    next_request_id: AtomicU64,
    reply_timeout: Duration,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RemoteBridgeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBridgeBackend")
            .field("ready", &self.core.is_ready())
            .field("pending_replies", &self.replies.lock().len())
            .field("reply_timeout", &self.reply_timeout)
            .finish()
    }
}

impl RemoteBridgeBackend {
    /// Attach to a bridge. `inbound` carries everything the player sends.
    pub fn attach(
        transport: Arc<dyn BridgeTransport>,
        inbound: mpsc::Receiver<BridgeMessage>,
        settings: &BridgeSettings,
    ) -> Self {
        let core = Arc::new(BackendCore::new(BackendKind::Remote, settings.event_capacity));
        let replies: Arc<ReplyMap> = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let pump = tokio::spawn(pump_inbound(
            inbound,
            Arc::clone(&core),
            Arc::clone(&transport),
            Arc::clone(&replies),
            cancel.clone(),
        ));

        Self {
            core,
            transport,
            replies,
            next_request_id: AtomicU64::new(1),
            reply_timeout: settings.reply_timeout(),
            cancel,
            pump: Mutex::new(Some(pump)),
        }
    }

    async fn command(&self, intent: Intent) -> BackendResult<()> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::Disconnected);
        }
        match self.core.defer(intent) {
            Some(intent) => self.transport.send(intent.into()).await,
            None => {
                debug!("[Bridge] Parked {:?} until the player is ready", intent);
                Ok(())
            }
        }
    }

    async fn query(&self, build: fn(u64) -> BridgeCommand) -> BackendResult<ReplyValue> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::Disconnected);
        }
        if !self.core.is_ready() {
            return Err(BackendError::NotReady);
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.replies.lock().insert(request_id, tx);

        if let Err(err) = self.transport.send(build(request_id)).await {
            self.replies.lock().remove(&request_id);
            return Err(err);
        }

        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(BackendError::Disconnected),
            Err(_) => {
                self.replies.lock().remove(&request_id);
                debug!("[Bridge] Request {} timed out", request_id);
                Err(BackendError::ReplyTimeout)
            }
        }
    }
}

async fn pump_inbound(
    mut inbound: mpsc::Receiver<BridgeMessage>,
    core: Arc<BackendCore>,
    transport: Arc<dyn BridgeTransport>,
    replies: Arc<ReplyMap>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = inbound.recv() => message,
        };

        match message {
            Some(BridgeMessage::Event(PlaybackEvent::Ready)) => {
                // Later acknowledgements return None and are dropped.
                if let Some(parked) = core.mark_ready() {
                    info!("[Bridge] Remote player ready");
                    if let Some(intent) = parked
                        && let Err(err) = transport.send(intent.into()).await
                    {
                        warn!("[Bridge] Parked {:?} failed on ready: {}", intent, err);
                    }
                }
            }
            Some(BridgeMessage::Event(event)) => core.emit(event),
            Some(BridgeMessage::Reply { request_id, value }) => {
                let waiter = replies.lock().remove(&request_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(value);
                    }
                    None => debug!("[Bridge] Late or unknown reply {}", request_id),
                }
            }
            None => {
                warn!("[Bridge] Remote player disconnected");
                core.emit(PlaybackEvent::Error { fatal: true });
                break;
            }
        }
    }

    // Dropping the senders fails every outstanding query.
    replies.lock().clear();
}

#[async_trait]
impl PlaybackBackend for RemoteBridgeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    async fn play(&self) -> BackendResult<()> {
        self.command(Intent::Play).await
    }

    async fn pause(&self) -> BackendResult<()> {
        self.command(Intent::Pause).await
    }

    async fn seek(&self, to_seconds: f64) -> BackendResult<()> {
        if !to_seconds.is_finite() {
            return Err(BackendError::Rejected(format!("seek to {to_seconds}")));
        }
        self.command(Intent::Seek(to_seconds.max(0.0))).await
    }

    async fn current_time(&self) -> BackendResult<f64> {
        match self
            .query(|request_id| BridgeCommand::GetCurrentTime { request_id })
            .await?
        {
            ReplyValue::Seconds(seconds) => Ok(seconds),
            other => Err(BackendError::Rejected(format!(
                "expected seconds, got {other:?}"
            ))),
        }
    }

    async fn is_paused(&self) -> BackendResult<bool> {
        match self
            .query(|request_id| BridgeCommand::GetPaused { request_id })
            .await?
        {
            ReplyValue::Paused(paused) => Ok(paused),
            other => Err(BackendError::Rejected(format!(
                "expected paused flag, got {other:?}"
            ))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.core.subscribe()
    }

    async fn detach(&self) {
        self.cancel.cancel();
        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            let _ = pump.await;
        }
    }
}

impl Drop for RemoteBridgeBackend {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
