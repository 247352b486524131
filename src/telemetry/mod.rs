//! # Gamepad Telemetry
//!
//! Streams the associated gamepad's raw state to the robot once per display
//! frame as `gamepad_raw_state` events.
//!
//! ```text
//! frame tick ──► associated? ──► snapshot? ──► GamepadRawState ──► link open? ──► send
//!                    │ no            │ none                            │ no
//!                    └── idle        └── skip                          └── drop
//! ```
//!
//! The stream is lossy by construction: at most one sample per frame, no
//! queueing of missed frames, no retransmission. The cadence never stops
//! because of a missing device or a closed link.
//!
//! - [`source`] - device association and snapshot reads

pub mod source;

pub use source::{DeviceSnapshot, GamepadSource, GilrsSource};

use chrono::{DateTime, Local};
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{now_millis, EidAllocator, GamepadRawState, OutboundEvent};
use crate::link::Outbound;
use crate::session::StatusBoard;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to initialize input devices: {0}")]
    InitializationError(String),
}

const DEFAULT_STATS_INTERVAL_SECS: i64 = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct SamplerSettings {
    /// Frame period; 16ms approximates a 60Hz display.
    pub frame_interval_ms: u64,
    pub stats_interval_secs: u64,
}

impl SamplerSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Stats logging period. Values chrono cannot represent fall back to the
    /// default period.
    pub fn stats_interval(&self) -> chrono::Duration {
        i64::try_from(self.stats_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| {
                warn!(
                    "Stats interval of {}s is out of range, using {}s",
                    self.stats_interval_secs, DEFAULT_STATS_INTERVAL_SECS
                );
                chrono::Duration::seconds(DEFAULT_STATS_INTERVAL_SECS)
            })
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            stats_interval_secs: DEFAULT_STATS_INTERVAL_SECS as u64,
        }
    }
}

/// What a single frame tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No device associated.
    NoDevice,
    /// Associated device could not be read this frame.
    DeviceUnavailable,
    /// Sample with this eid was queued on the link.
    Sent(u64),
    /// Sample with this eid was built but the link refused it.
    Dropped(u64),
}

#[derive(Debug)]
struct SampleStats {
    sent: u64,
    dropped: u64,
    idle: u64,
    last_log_time: DateTime<Local>,
}

impl SampleStats {
    fn new() -> Self {
        Self {
            sent: 0,
            dropped: 0,
            idle: 0,
            last_log_time: Local::now(),
        }
    }

    fn record(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Sent(_) => self.sent += 1,
            TickOutcome::Dropped(_) => self.dropped += 1,
            TickOutcome::NoDevice | TickOutcome::DeviceUnavailable => self.idle += 1,
        }
    }

    fn log_if_due(&mut self, interval: chrono::Duration) {
        let now = Local::now();
        if now - self.last_log_time > interval {
            info!(
                "Telemetry stats: {} sent, {} dropped, {} idle frames in last {} seconds",
                self.sent,
                self.dropped,
                self.idle,
                interval.num_seconds()
            );
            self.sent = 0;
            self.dropped = 0;
            self.idle = 0;
            self.last_log_time = now;
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SamplerState {
    Initializing,
    Sampling,
}

#[machine]
pub struct GamepadSampler<S: SamplerState> {
    source: Box<dyn GamepadSource>,
    eids: Arc<EidAllocator>,
    outbound: Arc<dyn Outbound>,
    settings: SamplerSettings,
    status: StatusBoard,
    stats: SampleStats,
    device: Option<String>,
}

impl<S: SamplerState> GamepadSampler<S> {
    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }
}

impl GamepadSampler<Initializing> {
    pub fn create(
        source: Box<dyn GamepadSource>,
        eids: Arc<EidAllocator>,
        outbound: Arc<dyn Outbound>,
        settings: Option<SamplerSettings>,
        status: StatusBoard,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating gamepad sampler with settings: {:?}", settings);
        Self::new(
            source,
            eids,
            outbound,
            settings,
            status,
            SampleStats::new(),
            None,
        )
    }

    /// Reads the initial association and starts sampling.
    pub fn attach(mut self) -> GamepadSampler<Sampling> {
        match self.source.associated() {
            Some(index) => info!("Gamepad sampler attached to device slot {}", index),
            None => info!("Gamepad sampler attached, no device associated yet"),
        }
        self.transition()
    }
}

impl GamepadSampler<Sampling> {
    /// Samples once. Never fails; every outcome keeps the cadence going.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(index) = self.source.associated() else {
            self.note_device(None);
            return TickOutcome::NoDevice;
        };

        let Some(snapshot) = self.source.snapshot(index) else {
            debug!("Device slot {} unreadable this frame, skipping", index);
            return TickOutcome::DeviceUnavailable;
        };
        self.note_device(Some(&snapshot.id));

        let event = GamepadRawState {
            generated_t: now_millis(),
            eid: self.eids.next_eid(),
            id: snapshot.id,
            index: snapshot.index,
            axes: snapshot.axes,
            buttons: snapshot.buttons,
        };
        let eid = event.eid;

        if !self.outbound.is_open() {
            debug!("Link not open, dropping sample eid={}", eid);
            return TickOutcome::Dropped(eid);
        }

        match self.outbound.send_event(&OutboundEvent::from(event)) {
            Ok(()) => TickOutcome::Sent(eid),
            Err(e) => {
                debug!("Dropping sample eid={}: {}", eid, e);
                TickOutcome::Dropped(eid)
            }
        }
    }

    /// Ticks once per frame until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let frame = self.settings.frame_interval();
        let stats_interval = self.settings.stats_interval();
        let mut ticker = tokio::time::interval(frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Starting gamepad sampler at {:?} per frame", frame);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.tick();
                    self.stats.record(outcome);
                    self.status.record_telemetry(outcome);
                    self.stats.log_if_due(stats_interval);
                }
            }
        }
        info!("Gamepad sampler stopped");
    }

    fn note_device(&mut self, id: Option<&str>) {
        if self.device.as_deref() != id {
            self.device = id.map(str::to_string);
            self.status.set_device(self.device.clone());
        }
    }
}
