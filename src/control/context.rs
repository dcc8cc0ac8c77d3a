use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{Command, ControlEvent, Fault, CONTROL_TOPIC};
use crate::actuator::{Actuator, ActuatorError, ActuatorState};
use crate::messaging::{InboundMessage, MessagingEvent, MessagingSession, QoS};
use crate::network::{NetworkEvent, NetworkSession};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// State and collaborators shared by the reconciliation handlers.
///
/// Handlers are plain synchronous calls; they may run concurrently from the
/// two event pumps. Connectivity is published on a watch channel so startup
/// can wait for it. The actuator state lock is held across the hardware write,
/// which keeps the line and the recorded state in step.
pub struct ControlContext {
    connectivity: watch::Sender<ConnectivityState>,
    actuator_state: Mutex<ActuatorState>,
    network: Arc<dyn NetworkSession>,
    messaging: Arc<dyn MessagingSession>,
    actuator: Arc<dyn Actuator>,
}

impl ControlContext {
    pub fn new(
        network: Arc<dyn NetworkSession>,
        messaging: Arc<dyn MessagingSession>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        let (connectivity, _) = watch::channel(ConnectivityState::Disconnected);
        Self {
            connectivity,
            actuator_state: Mutex::new(ActuatorState::Off),
            network,
            messaging,
            actuator,
        }
    }

    pub fn connectivity(&self) -> ConnectivityState {
        *self.connectivity.borrow()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.connectivity.subscribe()
    }

    pub fn actuator_state(&self) -> ActuatorState {
        *self.actuator_state.lock()
    }

    pub fn network(&self) -> &Arc<dyn NetworkSession> {
        &self.network
    }

    pub fn messaging(&self) -> &Arc<dyn MessagingSession> {
        &self.messaging
    }

    /// Configures the line as an output and drives it low to match `Off`.
    pub fn prepare_actuator(&self) -> Result<(), ActuatorError> {
        let mut state = self.actuator_state.lock();
        self.actuator.configure_as_output()?;
        self.actuator.set_actuator(false)?;
        *state = ActuatorState::Off;
        Ok(())
    }

    /// Waits until connectivity is `Connected`, giving up after `limit`.
    ///
    /// Returns `false` on timeout or when the state can no longer change.
    pub async fn wait_until_connected(&self, limit: Duration) -> bool {
        let mut rx = self.subscribe_connectivity();
        let connected = matches!(
            tokio::time::timeout(
                limit,
                rx.wait_for(|state| *state == ConnectivityState::Connected)
            )
            .await,
            Ok(Ok(_))
        );
        connected
    }

    pub fn handle(&self, event: ControlEvent) {
        match event {
            ControlEvent::Network(event) => self.handle_network(event),
            ControlEvent::Messaging(event) => self.handle_messaging(event),
        }
    }

    pub fn handle_network(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::SessionStarted => {
                debug!("Network session started, requesting association");
                self.set_connectivity(ConnectivityState::Connecting);
                self.network.request_association();
            }
            NetworkEvent::AddressAcquired { address } => {
                self.set_connectivity(ConnectivityState::Connected);
                info!("Network connection successful, local address {}", address);
            }
            NetworkEvent::SessionLost { reason } => {
                self.set_connectivity(ConnectivityState::Disconnected);
                warn!("{}; reconnecting", Fault::ConnectivityLost(reason));
                self.network.request_association();
            }
        }
    }

    pub fn handle_messaging(&self, event: MessagingEvent) {
        match event {
            MessagingEvent::SessionEstablished => {
                info!("MQTT connected, subscribing to {}", CONTROL_TOPIC);
                if let Err(e) = self.messaging.subscribe(CONTROL_TOPIC, QoS::AtMostOnce) {
                    error!("Subscription to {} failed: {}", CONTROL_TOPIC, e);
                }
            }
            MessagingEvent::MessageReceived(message) => self.apply_message(&message),
            MessagingEvent::SessionLost { reason } => {
                warn!("{}", Fault::SessionLost(reason));
            }
        }
    }

    fn apply_message(&self, message: &InboundMessage) {
        info!("Incoming message: {}", message);

        let command = Command::from_message(message);
        let Some(target) = command.target_state() else {
            warn!(
                "{}",
                Fault::DecodeUnrecognized {
                    topic: message.topic().to_string(),
                    preview: message.preview(),
                }
            );
            return;
        };

        let mut state = self.actuator_state.lock();
        *state = target;
        match self.actuator.set_actuator(target.is_on()) {
            Ok(()) => info!("Actuator switched {}", target),
            Err(e) => error!("Failed to switch actuator {}: {}", target, e),
        }
    }

    fn set_connectivity(&self, next: ConnectivityState) {
        let previous = self.connectivity.send_replace(next);
        if previous != next {
            debug!("Connectivity {:?} -> {:?}", previous, next);
        }
    }
}
