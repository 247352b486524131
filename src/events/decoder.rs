//! Inbound event decoding.
//!
//! Text frames from the robot are parsed once into a JSON object, the `name`
//! discriminant is matched explicitly, and the matching payload is decoded
//! into its typed event. Unknown names are rejected with
//! [`SchemaError::UnknownEvent`] instead of being dropped, since a silently
//! ignored confirmation request would leave the robot blocked.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{now_millis, ConfirmPolicy, ConfirmRequestEvent, EventMeta, ServerEvent, CONFIRM_REQUEST};

/// Errors raised for a single inbound frame. Fatal to that frame only.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("payload is not well-formed JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no string `name` discriminant")]
    MissingDiscriminant,

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("invalid `{name}` payload: {source}")]
    InvalidPayload {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Every event the robot may send to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ConfirmRequest(ConfirmRequestEvent),
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::ConfirmRequest(e) => e.name(),
        }
    }

    pub fn eid(&self) -> u64 {
        match self {
            InboundEvent::ConfirmRequest(e) => e.eid(),
        }
    }
}

#[derive(Deserialize)]
struct ConfirmRequestWire {
    eid: u64,
    generated_t: i64,
    msg: String,
    require_confirm: ConfirmPolicy,
}

/// Decodes inbound frames and stamps their arrival time.
///
/// Stamps handed out by one decoder never decrease, even if the wall clock
/// steps backwards between two frames.
pub struct Decoder {
    clock: Box<dyn FnMut() -> i64 + Send>,
    last_received_t: i64,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_clock(now_millis)
    }

    pub fn with_clock(clock: impl FnMut() -> i64 + Send + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            last_received_t: i64::MIN,
        }
    }

    fn stamp(&mut self) -> i64 {
        let now = (self.clock)();
        self.last_received_t = self.last_received_t.max(now);
        self.last_received_t
    }

    /// Decodes any known inbound event.
    pub fn decode(&mut self, raw: &str) -> Result<InboundEvent, SchemaError> {
        let received_t = self.stamp();

        let value: Value = serde_json::from_str(raw).map_err(SchemaError::Malformed)?;
        let name = match &value {
            Value::Object(fields) => match fields.get("name") {
                Some(Value::String(name)) => name.clone(),
                _ => return Err(SchemaError::MissingDiscriminant),
            },
            _ => return Err(SchemaError::NotAnObject),
        };

        let event = match name.as_str() {
            CONFIRM_REQUEST => {
                let wire: ConfirmRequestWire =
                    serde_json::from_value(value).map_err(|source| SchemaError::InvalidPayload {
                        name: CONFIRM_REQUEST,
                        source,
                    })?;
                let event = ConfirmRequestEvent {
                    eid: wire.eid,
                    generated_t: wire.generated_t,
                    received_t,
                    msg: wire.msg,
                    require_confirm: wire.require_confirm,
                };
                debug!(
                    "Decoded {} eid={} latency={}ms",
                    CONFIRM_REQUEST,
                    event.eid,
                    event.latency_ms()
                );
                InboundEvent::ConfirmRequest(event)
            }
            _ => return Err(SchemaError::UnknownEvent(name)),
        };

        Ok(event)
    }

    /// Decodes a frame that must be a `confirm_request`.
    pub fn decode_confirm_request(&mut self, raw: &str) -> Result<ConfirmRequestEvent, SchemaError> {
        match self.decode(raw)? {
            InboundEvent::ConfirmRequest(event) => Ok(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    const SCENARIO: &str = r#"{"name":"confirm_request","generated_t":1000,"eid":7,"msg":"Proceed?","require_confirm":"both"}"#;

    fn scripted_clock(times: Vec<i64>) -> impl FnMut() -> i64 + Send + 'static {
        let mut times = times.into_iter();
        move || times.next().unwrap_or(0)
    }

    #[test]
    fn decodes_confirm_request() {
        let mut decoder = Decoder::with_clock(|| 1_500);
        let event = decoder.decode_confirm_request(SCENARIO).unwrap();

        assert_eq!(event.eid, 7);
        assert_eq!(event.generated_t, 1000);
        assert_eq!(event.received_t, 1_500);
        assert_eq!(event.msg, "Proceed?");
        assert_eq!(event.require_confirm, ConfirmPolicy::Both);
    }

    #[test]
    fn wire_received_t_is_overwritten_locally() {
        let mut decoder = Decoder::with_clock(|| 42);
        let raw = r#"{"name":"confirm_request","generated_t":1,"eid":2,"msg":"m","require_confirm":"ok","received_t":99999}"#;
        let event = decoder.decode_confirm_request(raw).unwrap();
        assert_eq!(event.received_t, 42);
    }

    #[test]
    fn real_clock_stamps_are_non_decreasing() {
        let mut decoder = Decoder::new();
        let mut previous = i64::MIN;
        for _ in 0..20 {
            let event = decoder.decode_confirm_request(SCENARIO).unwrap();
            assert!(event.received_t >= previous);
            previous = event.received_t;
        }
    }

    #[test]
    fn stamps_hold_when_clock_steps_backwards() {
        let mut decoder = Decoder::with_clock(scripted_clock(vec![500, 400, 650]));
        let stamps: Vec<i64> = (0..3)
            .map(|_| decoder.decode_confirm_request(SCENARIO).unwrap().received_t)
            .collect();
        assert_eq!(stamps, vec![500, 500, 650]);
    }

    #[test]
    fn stamp_is_taken_before_parsing() {
        let calls = Arc::new(AtomicI64::new(0));
        let counter = Arc::clone(&calls);
        let mut decoder = Decoder::with_clock(move || counter.fetch_add(1, Ordering::SeqCst));
        assert!(decoder.decode("{not json").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let mut decoder = Decoder::new();
        let raw = r#"{"name":"gamepad_raw_state","generated_t":1,"eid":1,"id":"x","index":0,"axes":[],"buttons":[]}"#;
        match decoder.decode(raw) {
            Err(SchemaError::UnknownEvent(name)) => assert_eq!(name, "gamepad_raw_state"),
            other => panic!("expected UnknownEvent, got {:?}", other),
        }
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut decoder = Decoder::new();
        assert!(matches!(decoder.decode("not json at all"), Err(SchemaError::Malformed(_))));
    }

    #[test]
    fn non_object_is_rejected() {
        let mut decoder = Decoder::new();
        assert!(matches!(decoder.decode("[1,2,3]"), Err(SchemaError::NotAnObject)));
    }

    #[test]
    fn missing_or_non_string_name_is_rejected() {
        let mut decoder = Decoder::new();
        assert!(matches!(
            decoder.decode(r#"{"eid":1}"#),
            Err(SchemaError::MissingDiscriminant)
        ));
        assert!(matches!(
            decoder.decode(r#"{"name":5}"#),
            Err(SchemaError::MissingDiscriminant)
        ));
    }

    #[test]
    fn bad_policy_is_invalid_payload() {
        let mut decoder = Decoder::new();
        let raw = r#"{"name":"confirm_request","generated_t":1,"eid":2,"msg":"m","require_confirm":"maybe"}"#;
        match decoder.decode_confirm_request(raw) {
            Err(SchemaError::InvalidPayload { name, .. }) => assert_eq!(name, "confirm_request"),
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn inbound_event_accessors() {
        let mut decoder = Decoder::new();
        let event = decoder.decode(SCENARIO).unwrap();
        assert_eq!(event.name(), "confirm_request");
        assert_eq!(event.eid(), 7);
    }
}
