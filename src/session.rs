//! Session context shared by both producers.
//!
//! A [`Session`] owns the single [`EidAllocator`] and hands it, together with
//! the outbound link, to the confirm service and the gamepad sampler. Those
//! two tasks share nothing else: each publishes its progress on its own
//! [`StatusBoard`], and [`StatusFeed`] merges both for the operator window.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TeleopConfig;
use crate::confirm::{ConfirmService, Prompter};
use crate::events::EidAllocator;
use crate::link::{LinkError, LinkHandle, Outbound};
use crate::telemetry::{GamepadSampler, GamepadSource, SamplerSettings, TickOutcome};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),
}

/// Snapshot of session progress shown to the operator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStatus {
    pub device: Option<String>,
    pub telemetry_sent: u64,
    pub telemetry_dropped: u64,
    pub confirms_resolved: u64,
    pub last_confirm_failure: Option<String>,
}

/// Cloneable writer for [`SessionStatus`].
#[derive(Clone, Debug)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<SessionStatus>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    pub fn set_device(&self, device: Option<String>) {
        self.tx.send_modify(|s| s.device = device);
    }

    pub fn record_telemetry(&self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Sent(_) => self.tx.send_modify(|s| s.telemetry_sent += 1),
            TickOutcome::Dropped(_) => self.tx.send_modify(|s| s.telemetry_dropped += 1),
            TickOutcome::NoDevice | TickOutcome::DeviceUnavailable => {}
        }
    }

    pub fn record_confirm_resolved(&self) {
        self.tx.send_modify(|s| s.confirms_resolved += 1);
    }

    pub fn record_confirm_failure(&self, failure: String) {
        self.tx.send_modify(|s| s.last_confirm_failure = Some(failure));
    }
}

/// Read side of both producers' boards.
#[derive(Clone, Debug)]
pub struct StatusFeed {
    confirm: watch::Receiver<SessionStatus>,
    telemetry: watch::Receiver<SessionStatus>,
}

impl StatusFeed {
    pub fn new(confirm: &StatusBoard, telemetry: &StatusBoard) -> Self {
        Self {
            confirm: confirm.subscribe(),
            telemetry: telemetry.subscribe(),
        }
    }

    /// Confirm counters from the confirm board, device and telemetry
    /// counters from the telemetry board.
    pub fn snapshot(&self) -> SessionStatus {
        let confirm = self.confirm.borrow();
        let telemetry = self.telemetry.borrow();
        SessionStatus {
            device: telemetry.device.clone(),
            telemetry_sent: telemetry.telemetry_sent,
            telemetry_dropped: telemetry.telemetry_dropped,
            confirms_resolved: confirm.confirms_resolved,
            last_confirm_failure: confirm.last_confirm_failure.clone(),
        }
    }
}

/// Running confirm and telemetry tasks around one link.
pub struct Session {
    eids: Arc<EidAllocator>,
    confirm_status: StatusBoard,
    telemetry_status: StatusBoard,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Connects the link described by `config` and starts both producers.
    pub async fn connect<P: Prompter + 'static>(
        config: &TeleopConfig,
        prompter: P,
        source: Option<Box<dyn GamepadSource>>,
        shutdown: CancellationToken,
    ) -> Result<(Self, LinkHandle), SessionError> {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.link.inbound_capacity.max(1));
        let link = LinkHandle::connect(
            &config.link.url,
            config.link.outbound_capacity,
            inbound_tx,
            shutdown.clone(),
        )
        .await?;

        let session = Self::spawn(
            Arc::new(link.clone()),
            inbound_rx,
            prompter,
            source,
            Some(config.sampler_settings()),
            shutdown,
        );
        Ok((session, link))
    }

    /// Starts both producers on an existing link.
    ///
    /// Telemetry is skipped when `source` is `None`.
    pub fn spawn<P: Prompter + 'static>(
        outbound: Arc<dyn Outbound>,
        inbound: mpsc::Receiver<String>,
        prompter: P,
        source: Option<Box<dyn GamepadSource>>,
        sampler_settings: Option<SamplerSettings>,
        shutdown: CancellationToken,
    ) -> Self {
        let eids = Arc::new(EidAllocator::new());
        let confirm_status = StatusBoard::new();
        let telemetry_status = StatusBoard::new();
        let mut tasks = Vec::new();

        info!("Starting confirm service");
        let confirm = ConfirmService::new(
            prompter,
            Arc::clone(&eids),
            Arc::clone(&outbound),
            confirm_status.clone(),
        );
        tasks.push(tokio::spawn(confirm.run(inbound, shutdown.clone())));

        match source {
            Some(source) => {
                info!("Starting gamepad sampler");
                let sampler = GamepadSampler::create(
                    source,
                    Arc::clone(&eids),
                    outbound,
                    sampler_settings,
                    telemetry_status.clone(),
                )
                .attach();
                tasks.push(tokio::spawn(sampler.run(shutdown.clone())));
            }
            None => warn!("Telemetry disabled, no gamepad source"),
        }

        Self {
            eids,
            confirm_status,
            telemetry_status,
            shutdown,
            tasks,
        }
    }

    pub fn eids(&self) -> &Arc<EidAllocator> {
        &self.eids
    }

    pub fn status(&self) -> StatusFeed {
        StatusFeed::new(&self.confirm_status, &self.telemetry_status)
    }

    /// Cancels both producers and waits briefly for them.
    ///
    /// A task still blocked on an operator decision is aborted.
    pub async fn shutdown(self) {
        info!("Shutting down session");
        self.shutdown.cancel();
        for mut task in self.tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("Session task did not stop in time, aborting");
                task.abort();
            } else {
                debug!("Session task stopped");
            }
        }
    }
}
