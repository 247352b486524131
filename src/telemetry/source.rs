//! Input device access for the telemetry sampler.
//!
//! [`GilrsSource`] tracks which gamepad is associated through gilrs'
//! connect/disconnect events and reads live snapshots laid out like the
//! standard gamepad mapping: four stick axes and seventeen buttons.

use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

use super::TelemetryError;
use crate::events::GamepadBtn;

/// Axis order of a snapshot.
pub const STANDARD_AXES: [Axis; 4] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

/// Button order of a snapshot.
pub const STANDARD_BUTTONS: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Full point-in-time reading of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub id: String,
    pub index: usize,
    pub axes: Vec<f64>,
    pub buttons: Vec<GamepadBtn>,
}

/// Provider of the associated device and its live state.
pub trait GamepadSource: Send {
    /// Applies pending connect/disconnect notifications and returns the slot
    /// of the associated device, if any.
    fn associated(&mut self) -> Option<usize>;

    /// Reads the device in `index`. `None` when it cannot be read right now.
    fn snapshot(&mut self, index: usize) -> Option<DeviceSnapshot>;
}

pub struct GilrsSource {
    gilrs: Gilrs,
    active: Option<GamepadId>,
}

impl GilrsSource {
    /// Opens gilrs and associates the first gamepad already connected.
    pub fn new() -> Result<Self, TelemetryError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(TelemetryError::InitializationError(e.to_string()));
            }
        };

        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = gilrs.gamepads().collect();
        let active = if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one to connect");
            None
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            info!("Associated gamepad: {} ({})", gamepad.name(), id);
            Some(*id)
        };

        Ok(Self { gilrs, active })
    }
}

impl GamepadSource for GilrsSource {
    fn associated(&mut self) -> Option<usize> {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            let next = next_association(self.active, id, &event);
            if next == self.active {
                continue;
            }
            match next {
                Some(id) => info!("Associated gamepad: {} ({})", self.gilrs.gamepad(id).name(), id),
                None => warn!("Associated gamepad disconnected"),
            }
            self.active = next;
        }
        self.active.map(usize::from)
    }

    fn snapshot(&mut self, index: usize) -> Option<DeviceSnapshot> {
        let (_, gamepad) = self
            .gilrs
            .gamepads()
            .find(|(id, _)| usize::from(*id) == index)?;
        Some(read_gamepad(index, &gamepad))
    }
}

/// The most recently connected device wins. Disconnecting a device other
/// than the associated one leaves the association alone.
fn next_association<T: PartialEq + Copy>(active: Option<T>, id: T, event: &EventType) -> Option<T> {
    match event {
        EventType::Connected => Some(id),
        EventType::Disconnected if active == Some(id) => None,
        _ => active,
    }
}

fn read_gamepad(index: usize, gamepad: &Gamepad<'_>) -> DeviceSnapshot {
    // gilrs reports stick Y up-positive; the standard layout is down-positive.
    let axes = STANDARD_AXES
        .iter()
        .map(|axis| {
            let value = f64::from(gamepad.value(*axis));
            match axis {
                Axis::LeftStickY | Axis::RightStickY => -value,
                _ => value,
            }
        })
        .collect();

    let buttons = STANDARD_BUTTONS
        .iter()
        .map(|button| {
            let pressed = gamepad.is_pressed(*button);
            let value = gamepad
                .button_data(*button)
                .map(|data| f64::from(data.value()))
                .unwrap_or(if pressed { 1.0 } else { 0.0 });
            GamepadBtn {
                pressed,
                value,
                touched: pressed,
                index: None,
            }
        })
        .collect();

    debug!("Read snapshot of gamepad {} ({})", index, gamepad.name());
    DeviceSnapshot {
        id: gamepad.name().to_string(),
        index,
        axes,
        buttons,
    }
}
