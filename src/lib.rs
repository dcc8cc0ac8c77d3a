//! ledlink drives a single output line from MQTT `on`/`off` commands.
//!
//! The host waits for network connectivity and then joins the broker. It
//! subscribes to `led/control` and switches the line on each recognised
//! payload.

pub mod actuator;
pub mod config;
pub mod control;
pub mod messaging;
pub mod network;
