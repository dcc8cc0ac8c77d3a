//! Startup sequencer with statum state machine
//!
//! Brings components up in a fixed order and only starts MQTT once the link
//! is actually up, bounded by a timeout.
//!
//! ```text
//! Booting ──► OutputReady ──► LinkPending ──► LinkUp ──► Running
//!  prepare_output  start_network   await_link   start_messaging
//! ```

use std::sync::Arc;
use std::time::Duration;

use statum::{machine, state};
use tracing::{error, info};

use super::ControlContext;
use crate::actuator::ActuatorError;
use crate::messaging::{BrokerUri, MessagingError};
use crate::network::NetworkError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Network not connected within {0:?}")]
    ConnectivityTimeout(Duration),
}

#[state]
#[derive(Debug, Clone)]
pub enum StartupStage {
    Booting,
    OutputReady,
    LinkPending,
    LinkUp,
    Running,
}

#[machine]
pub struct Startup<S: StartupStage> {
    context: Arc<ControlContext>,
    broker: BrokerUri,
    connect_timeout: Duration,
}

impl<S: StartupStage> Startup<S> {
    pub fn context(&self) -> &Arc<ControlContext> {
        &self.context
    }
}

impl Startup<Booting> {
    pub fn create(
        context: Arc<ControlContext>,
        broker: BrokerUri,
        connect_timeout: Duration,
    ) -> Self {
        Self::new(context, broker, connect_timeout)
    }

    /// Resets the output line and drives it low.
    pub fn prepare_output(self) -> Result<Startup<OutputReady>, StartupError> {
        info!("Preparing output line");
        self.context.prepare_actuator()?;
        Ok(self.transition())
    }
}

impl Startup<OutputReady> {
    pub fn start_network(self) -> Result<Startup<LinkPending>, StartupError> {
        info!("Starting network session");
        self.context.network().start()?;
        Ok(self.transition())
    }
}

impl Startup<LinkPending> {
    pub async fn await_link(self) -> Result<Startup<LinkUp>, StartupError> {
        info!(
            "Waiting up to {:?} for network connectivity",
            self.connect_timeout
        );
        if self.context.wait_until_connected(self.connect_timeout).await {
            Ok(self.transition())
        } else {
            error!(
                "Network did not connect within {:?}, not starting MQTT",
                self.connect_timeout
            );
            Err(StartupError::ConnectivityTimeout(self.connect_timeout))
        }
    }
}

impl Startup<LinkUp> {
    pub fn start_messaging(self) -> Result<Startup<Running>, StartupError> {
        info!("Starting MQTT session towards {}", self.broker);
        self.context.messaging().connect(&self.broker)?;
        Ok(self.transition())
    }
}

/// Runs the whole bring-up sequence.
///
/// The event pumps must already be running, otherwise the wait for the link
/// cannot complete.
pub async fn run_startup(
    context: Arc<ControlContext>,
    broker: BrokerUri,
    connect_timeout: Duration,
) -> Result<Startup<Running>, StartupError> {
    let running = Startup::<Booting>::create(context, broker, connect_timeout)
        .prepare_output()?
        .start_network()?
        .await_link()
        .await?
        .start_messaging()?;
    info!("Startup complete");
    Ok(running)
}
