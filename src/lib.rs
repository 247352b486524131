//! Operator console bridging a gamepad and a confirmation dialog to a robot
//! controller over one WebSocket link.
//!
//! - [`events`] - wire event types, identity allocation and decoding
//! - [`confirm`] - confirm request/response correlation
//! - [`telemetry`] - frame-paced gamepad state streaming
//! - [`link`] - the WebSocket channel
//! - [`session`] - wiring of both flows around one link
//! - [`config`] - TOML configuration
//! - [`ui`] - egui operator window

pub mod config;
pub mod confirm;
pub mod events;
pub mod link;
pub mod session;
pub mod telemetry;
pub mod ui;

#[cfg(test)]
mod testing;
