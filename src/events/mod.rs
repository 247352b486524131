//! # Operator Link Event Model
//!
//! Every message on the operator link is one JSON object whose `name` field
//! selects its shape. Two flows share the link:
//!
//! ```text
//! robot ──confirm_request──► console ──confirm_response──► robot
//!                            console ──gamepad_raw_state─► robot (every frame)
//! ```
//!
//! Events carry `eid` and `generated_t` (epoch milliseconds). Events that this
//! side receives additionally carry `received_t`, stamped on decode and never
//! transmitted. Events produced here have no `received_t` at all.
//!
//! - [`eid`] - identifier allocation for local events
//! - [`decoder`] - inbound validation into [`InboundEvent`]

pub mod decoder;
pub mod eid;

pub use decoder::{Decoder, InboundEvent, SchemaError};
pub use eid::EidAllocator;

use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONFIRM_REQUEST: &str = "confirm_request";
pub const CONFIRM_RESPONSE: &str = "confirm_response";
pub const GAMEPAD_RAW_STATE: &str = "gamepad_raw_state";

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fields common to every event on the link.
pub trait EventMeta {
    /// Discriminant written to the `name` field.
    const NAME: &'static str;

    fn eid(&self) -> u64;

    fn generated_t(&self) -> i64;

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// An event generated by the remote peer and stamped on arrival here.
pub trait ServerEvent: EventMeta {
    fn received_t(&self) -> i64;

    /// Arrival minus generation time. Negative when the clocks disagree.
    fn latency_ms(&self) -> i64 {
        self.received_t() - self.generated_t()
    }
}

/// How a confirmation request may be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmPolicy {
    /// Only an affirmation ends the exchange.
    Ok,
    /// Only a decline ends the exchange.
    Cancel,
    /// The first answer ends the exchange, whichever it is.
    Both,
}

impl ConfirmPolicy {
    /// Terminal decision for one operator answer, or `None` if the same
    /// message has to be presented again.
    pub fn settle(self, affirmed: bool) -> Option<ConfirmDecision> {
        match (self, affirmed) {
            (ConfirmPolicy::Both | ConfirmPolicy::Ok, true) => Some(ConfirmDecision::Ok),
            (ConfirmPolicy::Both | ConfirmPolicy::Cancel, false) => Some(ConfirmDecision::Cancel),
            (ConfirmPolicy::Ok, false) | (ConfirmPolicy::Cancel, true) => None,
        }
    }
}

impl fmt::Display for ConfirmPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmPolicy::Ok => write!(f, "ok"),
            ConfirmPolicy::Cancel => write!(f, "cancel"),
            ConfirmPolicy::Both => write!(f, "both"),
        }
    }
}

/// The operator's final answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmDecision {
    Ok,
    Cancel,
}

impl From<bool> for ConfirmDecision {
    fn from(affirmed: bool) -> Self {
        if affirmed {
            ConfirmDecision::Ok
        } else {
            ConfirmDecision::Cancel
        }
    }
}

impl fmt::Display for ConfirmDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmDecision::Ok => write!(f, "ok"),
            ConfirmDecision::Cancel => write!(f, "cancel"),
        }
    }
}

/// `confirm_request`: the robot blocks until the operator answers `msg`.
///
/// Only produced by [`Decoder`]; `received_t` is set exactly once there.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmRequestEvent {
    pub eid: u64,
    pub generated_t: i64,
    pub received_t: i64,
    pub msg: String,
    pub require_confirm: ConfirmPolicy,
}

impl EventMeta for ConfirmRequestEvent {
    const NAME: &'static str = CONFIRM_REQUEST;

    fn eid(&self) -> u64 {
        self.eid
    }

    fn generated_t(&self) -> i64 {
        self.generated_t
    }
}

impl ServerEvent for ConfirmRequestEvent {
    fn received_t(&self) -> i64 {
        self.received_t
    }
}

/// `confirm_response`: answer correlated to a request via `respond_to_eid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmResponseEvent {
    pub generated_t: i64,
    pub eid: u64,
    pub respond_to_eid: u64,
    pub response: ConfirmDecision,
}

impl ConfirmResponseEvent {
    /// Builds the response to `request`, stamped now with a fresh `eid`.
    pub fn answering(request: &ConfirmRequestEvent, response: ConfirmDecision, eid: u64) -> Self {
        Self {
            generated_t: now_millis(),
            eid,
            respond_to_eid: request.eid,
            response,
        }
    }
}

impl EventMeta for ConfirmResponseEvent {
    const NAME: &'static str = CONFIRM_RESPONSE;

    fn eid(&self) -> u64 {
        self.eid
    }

    fn generated_t(&self) -> i64 {
        self.generated_t
    }
}

/// One button of a gamepad snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamepadBtn {
    pub pressed: bool,
    /// Analog pressure in `0.0..=1.0`.
    pub value: f64,
    pub touched: bool,
    /// Position in the button array, only set when buttons are reported flat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

/// `gamepad_raw_state`: full axes/buttons snapshot of the associated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamepadRawState {
    pub generated_t: i64,
    pub eid: u64,
    pub id: String,
    pub index: usize,
    pub axes: Vec<f64>,
    pub buttons: Vec<GamepadBtn>,
}

impl EventMeta for GamepadRawState {
    const NAME: &'static str = GAMEPAD_RAW_STATE;

    fn eid(&self) -> u64 {
        self.eid
    }

    fn generated_t(&self) -> i64 {
        self.generated_t
    }
}

/// Everything this side puts on the link, tagged by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum OutboundEvent {
    ConfirmResponse(ConfirmResponseEvent),
    GamepadRawState(GamepadRawState),
}

impl OutboundEvent {
    pub fn eid(&self) -> u64 {
        match self {
            OutboundEvent::ConfirmResponse(e) => e.eid(),
            OutboundEvent::GamepadRawState(e) => e.eid(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::ConfirmResponse(e) => e.name(),
            OutboundEvent::GamepadRawState(e) => e.name(),
        }
    }

    /// Serializes to the single-object text frame sent on the link.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<ConfirmResponseEvent> for OutboundEvent {
    fn from(event: ConfirmResponseEvent) -> Self {
        OutboundEvent::ConfirmResponse(event)
    }
}

impl From<GamepadRawState> for OutboundEvent {
    fn from(event: GamepadRawState) -> Self {
        OutboundEvent::GamepadRawState(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn request(eid: u64, policy: ConfirmPolicy) -> ConfirmRequestEvent {
        ConfirmRequestEvent {
            eid,
            generated_t: 1000,
            received_t: 1012,
            msg: "Proceed?".to_string(),
            require_confirm: policy,
        }
    }

    #[test]
    fn both_policy_settles_on_first_answer() {
        assert_eq!(ConfirmPolicy::Both.settle(true), Some(ConfirmDecision::Ok));
        assert_eq!(ConfirmPolicy::Both.settle(false), Some(ConfirmDecision::Cancel));
    }

    #[test]
    fn ok_policy_only_settles_on_affirmation() {
        assert_eq!(ConfirmPolicy::Ok.settle(false), None);
        assert_eq!(ConfirmPolicy::Ok.settle(true), Some(ConfirmDecision::Ok));
    }

    #[test]
    fn cancel_policy_only_settles_on_decline() {
        assert_eq!(ConfirmPolicy::Cancel.settle(true), None);
        assert_eq!(ConfirmPolicy::Cancel.settle(false), Some(ConfirmDecision::Cancel));
    }

    #[test]
    fn latency_is_arrival_minus_generation() {
        let req = request(3, ConfirmPolicy::Both);
        assert_eq!(req.latency_ms(), 12);
        assert_eq!(req.name(), "confirm_request");
    }

    #[test]
    fn response_echoes_request_eid() {
        let req = request(7, ConfirmPolicy::Both);
        let resp = ConfirmResponseEvent::answering(&req, ConfirmDecision::Ok, 1);
        assert_eq!(resp.respond_to_eid, 7);
        assert_eq!(resp.eid, 1);
        assert!(resp.generated_t > 0);
    }

    #[test]
    fn response_wire_shape() {
        let resp = ConfirmResponseEvent {
            generated_t: 2000,
            eid: 4,
            respond_to_eid: 7,
            response: ConfirmDecision::Cancel,
        };
        let json: Value = serde_json::from_str(&OutboundEvent::from(resp).to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({
                "name": "confirm_response",
                "generated_t": 2000,
                "eid": 4,
                "respond_to_eid": 7,
                "response": "cancel"
            })
        );
        assert!(json.get("received_t").is_none());
    }

    #[test]
    fn gamepad_state_wire_shape_omits_absent_button_index() {
        let state = GamepadRawState {
            generated_t: 5,
            eid: 9,
            id: "Xbox Wireless Controller".to_string(),
            index: 0,
            axes: vec![0.0, -0.5],
            buttons: vec![GamepadBtn {
                pressed: true,
                value: 1.0,
                touched: true,
                index: None,
            }],
        };
        let event = OutboundEvent::from(state);
        assert_eq!(event.name(), "gamepad_raw_state");
        assert_eq!(event.eid(), 9);

        let json: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["name"], "gamepad_raw_state");
        assert_eq!(json["axes"], json!([0.0, -0.5]));
        assert_eq!(json["buttons"][0], json!({"pressed": true, "value": 1.0, "touched": true}));
    }

    #[test]
    fn flat_button_keeps_index() {
        let btn = GamepadBtn {
            pressed: false,
            value: 0.25,
            touched: true,
            index: Some(6),
        };
        let json = serde_json::to_value(&btn).unwrap();
        assert_eq!(json["index"], 6);
    }
}
