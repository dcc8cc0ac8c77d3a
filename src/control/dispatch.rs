use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ControlContext, ControlEvent};
use crate::messaging::MessagingEvent;
use crate::network::NetworkEvent;

/// Join handles of the two event pump tasks.
pub struct EventPumps {
    pub network: JoinHandle<()>,
    pub messaging: JoinHandle<()>,
}

impl EventPumps {
    /// Waits for both pumps to finish, e.g. after cancelling their token.
    pub async fn join(self) {
        let _ = self.network.await;
        let _ = self.messaging.await;
    }
}

/// Spawns one task per event source, each feeding the shared context.
///
/// Must run before the network session is started so `SessionStarted` is
/// not missed.
pub fn spawn_event_pumps(
    context: Arc<ControlContext>,
    network_events: mpsc::Receiver<NetworkEvent>,
    messaging_events: mpsc::Receiver<MessagingEvent>,
    shutdown: CancellationToken,
) -> EventPumps {
    let network = tokio::spawn(pump(
        "network",
        context.clone(),
        network_events,
        shutdown.clone(),
    ));
    let messaging = tokio::spawn(pump("messaging", context, messaging_events, shutdown));
    debug!("Event pumps spawned");

    EventPumps { network, messaging }
}

async fn pump<E>(
    source: &'static str,
    context: Arc<ControlContext>,
    mut events: mpsc::Receiver<E>,
    shutdown: CancellationToken,
) where
    E: Into<ControlEvent>,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("{} pump cancelled", source);
                break;
            }
            event = events.recv() => match event {
                Some(event) => context.handle(event.into()),
                None => {
                    info!("{} event channel closed", source);
                    break;
                }
            },
        }
    }
}
