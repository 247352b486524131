//! # Confirmation Correlation
//!
//! Answers the robot's `confirm_request` events with correlated
//! `confirm_response` events.
//!
//! ```text
//! inbound text ──► Decoder ──► ConfirmExchange ──► Prompter ──► response ──► link
//!                               (Received → AwaitingDecision → Resolved)
//! ```
//!
//! - [`exchange`] - per-request typestate machine and policy loop
//! - [`prompt`] - operator decision surfaces
//!
//! [`ConfirmService`] consumes inbound frames strictly one after another: the
//! next frame is not decoded until the current exchange has resolved or
//! failed, so at most one request is ever awaiting a decision.

pub mod exchange;
pub mod prompt;

pub use exchange::{ConfirmExchange, ExchangeState};
pub use prompt::{PresentationError, PromptRequest, Prompter, TerminalPrompter, UiPrompter};

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::events::{ConfirmResponseEvent, Decoder, EidAllocator, OutboundEvent, SchemaError};
use crate::link::{LinkError, Outbound};
use crate::session::StatusBoard;

#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("Rejected inbound frame: {0}")]
    Schema(#[from] SchemaError),

    #[error("Could not present confirmation: {0}")]
    Presentation(#[from] PresentationError),

    #[error("Could not send confirmation response: {0}")]
    Link(#[from] LinkError),

    #[error("Exchange for eid={0} resolved without a decision")]
    Unresolved(u64),
}

/// Drives confirm requests from the link through the operator to a response.
pub struct ConfirmService<P: Prompter> {
    decoder: Decoder,
    prompter: P,
    eids: Arc<EidAllocator>,
    outbound: Arc<dyn Outbound>,
    status: StatusBoard,
}

impl<P: Prompter> ConfirmService<P> {
    pub fn new(
        prompter: P,
        eids: Arc<EidAllocator>,
        outbound: Arc<dyn Outbound>,
        status: StatusBoard,
    ) -> Self {
        Self::with_decoder(Decoder::new(), prompter, eids, outbound, status)
    }

    pub fn with_decoder(
        decoder: Decoder,
        prompter: P,
        eids: Arc<EidAllocator>,
        outbound: Arc<dyn Outbound>,
        status: StatusBoard,
    ) -> Self {
        Self {
            decoder,
            prompter,
            eids,
            outbound,
            status,
        }
    }

    /// Handles one inbound frame end to end.
    ///
    /// Returns the response that was sent. Nothing is sent unless the
    /// exchange fully resolved.
    pub async fn handle(&mut self, raw: &str) -> Result<ConfirmResponseEvent, ConfirmError> {
        let request = self.decoder.decode_confirm_request(raw)?;
        let resolved = ConfirmExchange::open(request)
            .begin()
            .decide(&mut self.prompter)
            .await?;

        let response = resolved.respond(self.eids.next_eid())?;
        self.outbound
            .send_event(&OutboundEvent::from(response.clone()))?;
        info!(
            "Sent confirm response eid={} respond_to_eid={} response={}",
            response.eid, response.respond_to_eid, response.response
        );
        Ok(response)
    }

    /// Processes inbound frames in delivery order until the channel closes or
    /// `shutdown` fires between two frames.
    ///
    /// A failed frame is reported and the loop continues with the next one.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<String>, shutdown: CancellationToken) {
        info!("Confirm service started");
        loop {
            let raw = tokio::select! {
                _ = shutdown.cancelled() => break,
                raw = inbound.recv() => match raw {
                    Some(raw) => raw,
                    None => break,
                },
            };

            match self.handle(&raw).await {
                Ok(_) => self.status.record_confirm_resolved(),
                Err(e) => {
                    error!("Confirm exchange failed: {}", e);
                    self.status.record_confirm_failure(e.to_string());
                }
            }
        }
        info!("Confirm service stopped");
    }
}
