//! # MQTT messaging
//!
//! Owns the broker session: connecting, subscribing, and turning incoming
//! packets into [`MessagingEvent`]s for the control glue.
//!
//! ```text
//! messaging/
//! ├── broker.rs        - Broker URI parsing
//! ├── message.rs       - Inbound message representation
//! └── mqtt_session.rs  - rumqttc client and event loop task
//! ```
//!
//! The glue only talks to the [`MessagingSession`] trait, so the rumqttc
//! client can be swapped for a scripted one in tests.

pub mod broker;
pub mod message;
pub mod mqtt_session;

pub use broker::{BrokerUri, BrokerUriError};
pub use message::InboundMessage;
pub use mqtt_session::MqttSession;
pub use rumqttc::QoS;

/// Lifecycle and data notifications produced by the messaging client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagingEvent {
    /// The broker accepted the session (CONNACK success).
    SessionEstablished,
    MessageReceived(InboundMessage),
    /// An established session dropped; the client keeps reconnecting on its own.
    SessionLost { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("MQTT session already connected")]
    AlreadyConnected,

    #[error("MQTT session not connected")]
    NotConnected,

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Narrow interface over the MQTT client.
pub trait MessagingSession: Send + Sync {
    /// Starts the session towards `broker`; establishment is reported as an event.
    fn connect(&self, broker: &BrokerUri) -> Result<(), MessagingError>;

    /// Queues a subscription request without waiting for the SUBACK.
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MessagingError>;
}
