#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledlink::actuator::{Actuator, ActuatorError};
use ledlink::control::ControlContext;
use ledlink::messaging::{BrokerUri, MessagingError, MessagingEvent, MessagingSession, QoS};
use ledlink::network::{NetworkError, NetworkEvent, NetworkSession};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Network manager that answers from a script instead of a real link.
pub struct FakeNetwork {
    events: mpsc::Sender<NetworkEvent>,
    acquire_on_request: bool,
    starts: AtomicUsize,
    requests: AtomicUsize,
}

impl FakeNetwork {
    pub fn new(events: mpsc::Sender<NetworkEvent>, acquire_on_request: bool) -> Self {
        Self {
            events,
            acquire_on_request,
            starts: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl NetworkSession for FakeNetwork {
    fn start(&self) -> Result<(), NetworkError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.try_send(NetworkEvent::SessionStarted);
        Ok(())
    }

    fn request_association(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.acquire_on_request {
            let address: SocketAddr = "192.168.4.20:49152".parse().unwrap();
            let _ = self
                .events
                .try_send(NetworkEvent::AddressAcquired { address });
        }
    }
}

/// Messaging client that records calls and establishes immediately.
pub struct FakeMessaging {
    events: mpsc::Sender<MessagingEvent>,
    fail_subscribe: AtomicBool,
    connects: Mutex<Vec<BrokerUri>>,
    subscriptions: Mutex<Vec<(String, QoS)>>,
}

impl FakeMessaging {
    pub fn new(events: mpsc::Sender<MessagingEvent>) -> Self {
        Self {
            events,
            fail_subscribe: AtomicBool::new(false),
            connects: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_subscriptions(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> Vec<BrokerUri> {
        self.connects.lock().clone()
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().clone()
    }
}

impl MessagingSession for FakeMessaging {
    fn connect(&self, broker: &BrokerUri) -> Result<(), MessagingError> {
        self.connects.lock().push(broker.clone());
        let _ = self.events.try_send(MessagingEvent::SessionEstablished);
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MessagingError> {
        self.subscriptions.lock().push((topic.to_string(), qos));
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(MessagingError::NotConnected);
        }
        Ok(())
    }
}

/// Output line that records every write.
#[derive(Default)]
pub struct RecordingActuator {
    configured: AtomicBool,
    writes: Mutex<Vec<bool>>,
}

impl RecordingActuator {
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<bool> {
        self.writes.lock().clone()
    }

    pub fn level(&self) -> Option<bool> {
        self.writes.lock().last().copied()
    }
}

impl Actuator for RecordingActuator {
    fn configure_as_output(&self) -> Result<(), ActuatorError> {
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_actuator(&self, on: bool) -> Result<(), ActuatorError> {
        if !self.is_configured() {
            return Err(ActuatorError::NotConfigured(0));
        }
        self.writes.lock().push(on);
        Ok(())
    }
}

pub struct Rig {
    pub context: Arc<ControlContext>,
    pub network: Arc<FakeNetwork>,
    pub messaging: Arc<FakeMessaging>,
    pub actuator: Arc<RecordingActuator>,
    pub network_rx: mpsc::Receiver<NetworkEvent>,
    pub messaging_rx: mpsc::Receiver<MessagingEvent>,
    pub messaging_tx: mpsc::Sender<MessagingEvent>,
}

impl Rig {
    pub fn new(acquire_on_request: bool) -> Self {
        let (network_tx, network_rx) = mpsc::channel(64);
        let (messaging_tx, messaging_rx) = mpsc::channel(64);

        let network = Arc::new(FakeNetwork::new(network_tx, acquire_on_request));
        let messaging = Arc::new(FakeMessaging::new(messaging_tx.clone()));
        let actuator = Arc::new(RecordingActuator::default());
        let context = Arc::new(ControlContext::new(
            network.clone(),
            messaging.clone(),
            actuator.clone(),
        ));

        Self {
            context,
            network,
            messaging,
            actuator,
            network_rx,
            messaging_rx,
            messaging_tx,
        }
    }

    /// Rig whose actuator is already configured and driven low.
    pub fn prepared() -> Self {
        let rig = Self::new(false);
        rig.context.prepare_actuator().unwrap();
        rig
    }
}

/// Polls `check` until it holds or a second has passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
