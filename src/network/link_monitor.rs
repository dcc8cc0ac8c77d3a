use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{NetworkError, NetworkEvent, NetworkSession};
use crate::config::NetworkSettings;

/// Host network manager that tracks reachability of a probe target.
///
/// An association attempt resolves the target and opens a TCP connection to
/// it. Success reports the local address the host used as `AddressAcquired`
/// and starts supervising the link; failure is reported as `SessionLost`
/// after `retry_delay`. Requests that arrive while an attempt is in flight or
/// the link is supervised are ignored.
pub struct LinkMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    target: String,
    association_timeout: Duration,
    supervision_interval: Duration,
    retry_delay: Duration,
    events: mpsc::Sender<NetworkEvent>,
    started: AtomicBool,
    engaged: AtomicBool,
    shutdown: CancellationToken,
}

impl LinkMonitor {
    pub fn new(
        target: impl Into<String>,
        settings: &NetworkSettings,
        events: mpsc::Sender<NetworkEvent>,
        shutdown: CancellationToken,
    ) -> Result<Self, NetworkError> {
        let target = target.into();
        validate_target(&target)?;
        debug!("Creating link monitor for probe target {}", target);

        Ok(Self {
            inner: Arc::new(Inner {
                target,
                association_timeout: settings.association_timeout(),
                supervision_interval: settings.supervision_interval(),
                retry_delay: settings.retry_delay(),
                events,
                started: AtomicBool::new(false),
                engaged: AtomicBool::new(false),
                shutdown,
            }),
        })
    }

    pub fn target(&self) -> &str {
        &self.inner.target
    }
}

impl NetworkSession for LinkMonitor {
    fn start(&self) -> Result<(), NetworkError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(NetworkError::AlreadyStarted);
        }

        info!("Starting link monitor towards {}", self.inner.target);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.emit(NetworkEvent::SessionStarted).await;
        });
        Ok(())
    }

    fn request_association(&self) {
        if self.inner.engaged.swap(true, Ordering::SeqCst) {
            debug!("Association already in progress or link up, ignoring request");
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.associate().await;
        });
    }
}

impl Inner {
    async fn associate(self: Arc<Self>) {
        info!("Associating via {}", self.target);

        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            outcome = self.probe() => outcome,
        };

        match outcome {
            Ok(address) => {
                self.emit(NetworkEvent::AddressAcquired { address }).await;
                self.supervise().await;
            }
            Err(reason) => {
                warn!("Association failed: {}", reason);
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    _ = sleep(self.retry_delay) => {}
                }
                self.lose(reason).await;
            }
        }
    }

    async fn supervise(&self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Link supervision cancelled");
                    return;
                }
                _ = sleep(self.supervision_interval) => {}
            }

            match self.probe().await {
                Ok(address) => debug!("Link to {} healthy via {}", self.target, address),
                Err(reason) => {
                    warn!("Link dropped: {}", reason);
                    self.lose(reason).await;
                    return;
                }
            }
        }
    }

    async fn probe(&self) -> Result<SocketAddr, String> {
        let attempt = async {
            let stream = TcpStream::connect(self.target.as_str()).await?;
            stream.local_addr()
        };

        match timeout(self.association_timeout, attempt).await {
            Ok(Ok(address)) => Ok(address),
            Ok(Err(e)) => Err(format!("probe {} failed: {}", self.target, e)),
            Err(_) => Err(format!(
                "probe {} timed out after {:?}",
                self.target, self.association_timeout
            )),
        }
    }

    async fn lose(&self, reason: String) {
        // Cleared before reporting so the reaction to this event is not ignored.
        self.engaged.store(false, Ordering::SeqCst);
        self.emit(NetworkEvent::SessionLost { reason }).await;
    }

    async fn emit(&self, event: NetworkEvent) {
        debug!("Network event: {:?}", event);
        if self.events.send(event).await.is_err() {
            debug!("Network event receiver dropped");
        }
    }
}

fn validate_target(target: &str) -> Result<(), NetworkError> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| NetworkError::InvalidProbe(format!("{} (expected host:port)", target)))?;

    if host.is_empty() {
        return Err(NetworkError::InvalidProbe(format!("{} (empty host)", target)));
    }
    port.parse::<u16>()
        .map_err(|_| NetworkError::InvalidProbe(format!("{} (bad port)", target)))?;
    Ok(())
}
