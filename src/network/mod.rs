//! Network session management
//!
//! The network manager owns the association lifecycle and reports it as
//! [`NetworkEvent`]s on a channel. The control glue reacts to those events and
//! asks for (re)association through [`NetworkSession::request_association`].
//!
//! [`link_monitor::LinkMonitor`] is the host implementation: a link counts as
//! associated while a TCP connection towards the probe target can be opened.

pub mod link_monitor;

use std::net::SocketAddr;

pub use link_monitor::LinkMonitor;

/// Lifecycle notifications produced by the network manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The manager is running and ready to associate.
    SessionStarted,
    /// Association finished and the host holds a usable address.
    AddressAcquired { address: SocketAddr },
    /// Association failed or an established link dropped.
    SessionLost { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Network session already started")]
    AlreadyStarted,

    #[error("Invalid probe target: {0}")]
    InvalidProbe(String),
}

/// Narrow interface over the network manager.
pub trait NetworkSession: Send + Sync {
    /// Starts the manager; it answers with [`NetworkEvent::SessionStarted`].
    fn start(&self) -> Result<(), NetworkError>;

    /// Asks the manager to associate. Fire and forget: the outcome arrives
    /// later as `AddressAcquired` or `SessionLost`.
    fn request_association(&self);
}
