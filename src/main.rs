use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use ledlink::actuator::{Actuator, GpioActuator, LogActuator};
use ledlink::config::{ActuatorBackend, Settings};
use ledlink::control::{run_startup, spawn_event_pumps, ControlContext};
use ledlink::messaging::{BrokerUri, MqttSession};
use ledlink::network::LinkMonitor;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = Settings::load().await?;
    let broker: BrokerUri = settings
        .broker
        .uri
        .parse()
        .map_err(|e| eyre!("Invalid broker URI {:?}: {}", settings.broker.uri, e))?;

    let shutdown = CancellationToken::new();
    let capacity = settings.broker.event_capacity.max(1);
    let (network_tx, network_rx) = mpsc::channel(capacity);
    let (messaging_tx, messaging_rx) = mpsc::channel(capacity);

    let probe = settings
        .network
        .probe
        .clone()
        .unwrap_or_else(|| broker.authority());
    let network = Arc::new(LinkMonitor::new(
        probe,
        &settings.network,
        network_tx,
        shutdown.clone(),
    )?);
    info!("Link probe target {}", network.target());
    let messaging = Arc::new(MqttSession::new(
        settings.broker.clone(),
        messaging_tx,
        shutdown.clone(),
    ));
    let actuator: Arc<dyn Actuator> = match settings.actuator.backend {
        ActuatorBackend::Gpio => Arc::new(GpioActuator::new(settings.actuator.pin)),
        ActuatorBackend::Log => Arc::new(LogActuator::new(settings.actuator.pin)),
    };

    let context = Arc::new(ControlContext::new(network, messaging, actuator));
    let pumps = spawn_event_pumps(context.clone(), network_rx, messaging_rx, shutdown.clone());

    let running = match run_startup(context, broker, settings.startup.connect_timeout()).await {
        Ok(running) => running,
        Err(e) => {
            error!("Startup failed: {}", e);
            shutdown.cancel();
            pumps.join().await;
            return Err(e.into());
        }
    };
    info!(
        "Running with link {:?}, output {}",
        running.context().connectivity(),
        running.context().actuator_state()
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for shutdown signal: {}", e))?;

    info!("Shutting down");
    shutdown.cancel();
    pumps.join().await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
