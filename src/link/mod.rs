//! # Operator Link
//!
//! WebSocket client carrying both flows between the console and the robot.
//!
//! ```text
//!              ┌──────── reader task ────────┐
//! robot ──ws──►│ Text frames → inbound mpsc  │──► ConfirmService
//!              └─────────────────────────────┘
//!              ┌──────── writer task ────────┐
//! robot ◄──ws──│ outbound mpsc → Text frames │◄── LinkHandle::send
//!              └─────────────────────────────┘
//! ```
//!
//! Sends never block: [`LinkHandle::send`] refuses immediately when the link
//! is not open or the outbound queue is full. The link does not reconnect;
//! once [`LinkState::Closed`] it stays closed.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::OutboundEvent;

/// Connection state as observed by the producers and the UI.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Failed to connect to {url}: {reason}")]
    ConnectError { url: String, reason: String },

    #[error("Link is not open")]
    Closed,

    #[error("Outbound queue is full")]
    QueueFull,

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fire-and-forget text sink shared by the confirm and telemetry flows.
pub trait Outbound: Send + Sync {
    /// Queues one text frame. Never waits for the peer.
    fn send(&self, text: String) -> Result<(), LinkError>;

    fn is_open(&self) -> bool;

    fn send_event(&self, event: &OutboundEvent) -> Result<(), LinkError> {
        self.send(event.to_json()?)
    }
}

/// Cloneable handle to a running link.
#[derive(Clone, Debug)]
pub struct LinkHandle {
    outbound: mpsc::Sender<String>,
    state: watch::Receiver<LinkState>,
}

impl LinkHandle {
    /// Wraps an outbound queue and its state feed.
    pub fn new(outbound: mpsc::Sender<String>, state: watch::Receiver<LinkState>) -> Self {
        Self { outbound, state }
    }

    /// Connects to `url` and spawns the reader and writer tasks.
    ///
    /// Every inbound text frame is forwarded, in delivery order, to `inbound`.
    /// Both tasks stop when `shutdown` is cancelled or the peer goes away.
    pub async fn connect(
        url: &str,
        outbound_capacity: usize,
        inbound: mpsc::Sender<String>,
        shutdown: CancellationToken,
    ) -> Result<Self, LinkError> {
        info!("Connecting operator link to {}", url);
        let (ws_stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| LinkError::ConnectError {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        info!("Operator link connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (state_tx, state_rx) = watch::channel(LinkState::Open);
        let state_tx = Arc::new(state_tx);
        let (out_tx, mut out_rx) = mpsc::channel::<String>(outbound_capacity.max(1));
        let link_closed = shutdown.child_token();

        let reader_state = Arc::clone(&state_tx);
        let reader_closed = link_closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_closed.cancelled() => break,
                    msg = ws_rx.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            debug!("Inbound frame: {}", text.as_str());
                            if inbound.send(text.as_str().to_owned()).await.is_err() {
                                warn!("Inbound consumer gone, closing reader");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("Operator link closed by peer: {:?}", frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Operator link read error: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
            reader_state.send_replace(LinkState::Closed);
            reader_closed.cancel();
            info!("Operator link reader stopped");
        });

        let writer_state = Arc::clone(&state_tx);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = link_closed.cancelled() => break,
                    text = out_rx.recv() => match text {
                        Some(text) => {
                            if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                                error!("Operator link write error: {}", e);
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
            writer_state.send_replace(LinkState::Closed);
            link_closed.cancel();
            if let Err(e) = ws_tx.close().await {
                debug!("Close handshake failed: {}", e);
            }
            info!("Operator link writer stopped");
        });

        Ok(Self::new(out_tx, state_rx))
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }
}

impl Outbound for LinkHandle {
    fn send(&self, text: String) -> Result<(), LinkError> {
        if !self.is_open() {
            return Err(LinkError::Closed);
        }
        self.outbound.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::QueueFull,
            TrySendError::Closed(_) => LinkError::Closed,
        })
    }

    fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }
}
