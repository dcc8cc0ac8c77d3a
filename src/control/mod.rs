//! Control glue
//!
//! Reconciles network and messaging lifecycle events with the output line.
//!
//! ```text
//! LinkMonitor ──[NetworkEvent]──►   pump ─┐
//!                                         ├─► ControlContext ──► Actuator
//! MqttSession ──[MessagingEvent]──► pump ─┘        │
//!                                                  └─► request_association / subscribe
//! ```
//!
//! 1. [`command`] - Payload decoding
//! 2. [`context`] - Shared state and the two reconciliation handlers
//! 3. [`dispatch`] - Event pumps feeding the handlers
//! 4. [`startup`] - Bring-up sequence with a bounded wait for the link

pub mod command;
pub mod context;
pub mod dispatch;
pub mod startup;

pub use command::Command;
pub use context::{ConnectivityState, ControlContext};
pub use dispatch::{spawn_event_pumps, EventPumps};
pub use startup::{run_startup, StartupError};

use crate::messaging::MessagingEvent;
use crate::network::NetworkEvent;

/// Topic carrying control payloads.
pub const CONTROL_TOPIC: &str = "led/control";

/// Any event the handlers react to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    Network(NetworkEvent),
    Messaging(MessagingEvent),
}

impl From<NetworkEvent> for ControlEvent {
    fn from(event: NetworkEvent) -> Self {
        ControlEvent::Network(event)
    }
}

impl From<MessagingEvent> for ControlEvent {
    fn from(event: MessagingEvent) -> Self {
        ControlEvent::Messaging(event)
    }
}

/// Runtime faults. None of these are returned to a caller; they are only logged.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Fault {
    #[error("Connectivity lost: {0}")]
    ConnectivityLost(String),

    #[error("Messaging session lost: {0}")]
    SessionLost(String),

    #[error("Unrecognized payload on {topic}: {preview:?}")]
    DecodeUnrecognized { topic: String, preview: String },
}
