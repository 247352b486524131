//! In-memory stand-ins for the link, the operator and the input device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::confirm::{PresentationError, Prompter};
use crate::link::{LinkError, Outbound};
use crate::telemetry::{DeviceSnapshot, GamepadSource};

/// Answers prompts from a fixed script, then reports no surface.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<bool>,
    messages: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            messages: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Prompter for ScriptedPrompter {
    async fn ask(&mut self, message: &str) -> Result<bool, PresentationError> {
        self.messages.push(message.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PresentationError::Unavailable("script exhausted".to_string()))
    }
}

/// Records every frame handed to the link.
#[derive(Debug, Default)]
pub struct RecordingOutbound {
    open: AtomicBool,
    refuse: AtomicBool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

impl RecordingOutbound {
    pub fn open() -> Self {
        let outbound = Self::default();
        outbound.set_open(true);
        outbound
    }

    pub fn closed() -> Self {
        Self::default()
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Makes `send` fail with a full queue while still counting the attempt.
    pub fn refuse_sends(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn send_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Outbound for RecordingOutbound {
    fn send(&self, text: String) -> Result<(), LinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.is_open() {
            return Err(LinkError::Closed);
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(LinkError::QueueFull);
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct FakeDevice {
    snapshot: Option<DeviceSnapshot>,
    unreadable: bool,
    reads: usize,
}

/// Shared-state fake device; clones observe and drive the same device.
#[derive(Clone, Debug, Default)]
pub struct FakeSource {
    device: Arc<Mutex<FakeDevice>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, snapshot: DeviceSnapshot) {
        self.device.lock().unwrap().snapshot = Some(snapshot);
    }

    pub fn disconnect(&self) {
        self.device.lock().unwrap().snapshot = None;
    }

    pub fn set_readable(&self, readable: bool) {
        self.device.lock().unwrap().unreadable = !readable;
    }

    pub fn reads(&self) -> usize {
        self.device.lock().unwrap().reads
    }
}

impl GamepadSource for FakeSource {
    fn associated(&mut self) -> Option<usize> {
        self.device.lock().unwrap().snapshot.as_ref().map(|s| s.index)
    }

    fn snapshot(&mut self, index: usize) -> Option<DeviceSnapshot> {
        let mut device = self.device.lock().unwrap();
        device.reads += 1;
        if device.unreadable {
            return None;
        }
        device.snapshot.clone().filter(|s| s.index == index)
    }
}
