use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{BrokerUri, InboundMessage, MessagingError, MessagingEvent, MessagingSession};
use crate::config::BrokerSettings;

/// rumqttc-backed messaging client.
///
/// `connect` spawns a task that polls the event loop until shutdown. rumqttc
/// reconnects on the next poll after an error, so the task only reports the
/// transitions and paces the retries.
pub struct MqttSession {
    settings: BrokerSettings,
    events: mpsc::Sender<MessagingEvent>,
    client: Mutex<Option<AsyncClient>>,
    shutdown: CancellationToken,
}

impl MqttSession {
    pub fn new(
        settings: BrokerSettings,
        events: mpsc::Sender<MessagingEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            settings,
            events,
            client: Mutex::new(None),
            shutdown,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.lock().is_some()
    }
}

impl MessagingSession for MqttSession {
    fn connect(&self, broker: &BrokerUri) -> Result<(), MessagingError> {
        let mut slot = self.client.lock();
        if slot.is_some() {
            return Err(MessagingError::AlreadyConnected);
        }

        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            broker.host().to_string(),
            broker.port(),
        );
        options.set_keep_alive(self.settings.keep_alive());

        let (client, eventloop) = AsyncClient::new(options, self.settings.event_capacity.max(1));
        info!(
            "Connecting to MQTT broker {} as {}",
            broker, self.settings.client_id
        );

        tokio::spawn(run_event_loop(
            eventloop,
            self.events.clone(),
            self.settings.reconnect_delay(),
            self.shutdown.clone(),
        ));

        *slot = Some(client);
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), MessagingError> {
        let slot = self.client.lock();
        let client = slot.as_ref().ok_or(MessagingError::NotConnected)?;
        client.try_subscribe(topic, qos)?;
        debug!("Queued subscription to {} at {:?}", topic, qos);
        Ok(())
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    events: mpsc::Sender<MessagingEvent>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) {
    let mut established = false;

    loop {
        let polled = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("MQTT event loop shutting down");
                return;
            }
            polled = eventloop.poll() => polled,
        };

        let event = match polled {
            // Refused CONNACKs come back as ConnectionError::ConnectionRefused.
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                established = true;
                Some(MessagingEvent::SessionEstablished)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => Some(
                MessagingEvent::MessageReceived(InboundMessage::new(publish.topic, publish.payload)),
            ),
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                debug!("Subscription acknowledged: {:?}", ack.return_codes);
                None
            }
            Ok(_) => None,
            Err(e) => {
                let lost = match (&e, established) {
                    (_, true) => {
                        established = false;
                        Some(MessagingEvent::SessionLost {
                            reason: e.to_string(),
                        })
                    }
                    (ConnectionError::ConnectionRefused(code), false) => {
                        warn!("Broker refused session: {:?}", code);
                        None
                    }
                    (_, false) => {
                        warn!("MQTT connection attempt failed: {}", e);
                        None
                    }
                };

                if let Some(event) = lost {
                    if events.send(event).await.is_err() {
                        debug!("Messaging event receiver dropped, stopping event loop");
                        return;
                    }
                }

                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = sleep(reconnect_delay) => {}
                }
                continue;
            }
        };

        if let Some(event) = event {
            if events.send(event).await.is_err() {
                error!("Messaging event receiver dropped, stopping event loop");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
    const CONNACK_NOT_AUTHORIZED: [u8; 4] = [0x20, 0x02, 0x00, 0x05];

    fn quick_settings(reconnect_delay_ms: u64) -> BrokerSettings {
        BrokerSettings {
            reconnect_delay_ms,
            ..BrokerSettings::default()
        }
    }

    /// QoS 0 PUBLISH frame; topic and payload must stay under 125 bytes together.
    fn publish_frame(topic: &str, payload: &[u8]) -> Vec<u8> {
        let remaining = 2 + topic.len() + payload.len();
        let mut frame = vec![0x30, remaining as u8, 0x00, topic.len() as u8];
        frame.extend_from_slice(topic.as_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Accepts the client and consumes its CONNECT packet.
    async fn accept_client(listener: &TcpListener) -> TcpStream {
        let (mut socket, _) = timeout(Duration::from_secs(2), listener.accept())
            .await
            .expect("client connects in time")
            .unwrap();
        let mut connect = [0u8; 256];
        let read = socket.read(&mut connect).await.unwrap();
        assert!(read > 0);
        assert_eq!(connect[0] & 0xf0, 0x10, "first packet is CONNECT");
        socket
    }

    async fn next_event(rx: &mut mpsc::Receiver<MessagingEvent>) -> MessagingEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn broker_packets_become_session_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let session = MqttSession::new(quick_settings(50), tx, shutdown.clone());

        session.connect(&BrokerUri::new("127.0.0.1", port)).unwrap();
        let mut socket = accept_client(&listener).await;

        socket.write_all(&CONNACK_ACCEPTED).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MessagingEvent::SessionEstablished);

        socket
            .write_all(&publish_frame("led/control", b"on"))
            .await
            .unwrap();
        match next_event(&mut rx).await {
            MessagingEvent::MessageReceived(message) => {
                assert_eq!(message.topic(), "led/control");
                assert_eq!(message.body(), Some(&b"on"[..]));
            }
            other => panic!("unexpected event {:?}", other),
        }

        drop(socket);
        assert!(matches!(
            next_event(&mut rx).await,
            MessagingEvent::SessionLost { .. }
        ));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn refused_session_emits_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let session = MqttSession::new(quick_settings(5_000), tx, shutdown.clone());

        session.connect(&BrokerUri::new("127.0.0.1", port)).unwrap();
        let mut socket = accept_client(&listener).await;
        socket.write_all(&CONNACK_NOT_AUTHORIZED).await.unwrap();

        assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn subscribe_before_connect_fails() {
        let (tx, _rx) = mpsc::channel(4);
        let session = MqttSession::new(BrokerSettings::default(), tx, CancellationToken::new());
        assert!(matches!(
            session.subscribe("led/control", QoS::AtMostOnce),
            Err(MessagingError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let (tx, _rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let session = MqttSession::new(BrokerSettings::default(), tx, shutdown.clone());
        let broker = BrokerUri::new("127.0.0.1", 1);

        session.connect(&broker).unwrap();
        assert!(session.is_connected());
        assert!(matches!(
            session.connect(&broker),
            Err(MessagingError::AlreadyConnected)
        ));

        // Queued locally; nothing reaches the (absent) broker.
        session.subscribe("led/control", QoS::AtMostOnce).unwrap();
        shutdown.cancel();
    }
}
