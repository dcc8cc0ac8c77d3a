//! Actuator interface
//!
//! A single digital output line driven by decoded commands. The control glue
//! only sees the [`Actuator`] trait; [`gpio::GpioActuator`] drives a real pin
//! through rppal and [`gpio::LogActuator`] stands in on hosts without GPIO.

pub mod gpio;

use std::fmt;

pub use gpio::{GpioActuator, LogActuator};

/// Logical state of the output line, as last commanded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActuatorState {
    #[default]
    Off,
    On,
}

impl ActuatorState {
    pub fn is_on(self) -> bool {
        matches!(self, ActuatorState::On)
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActuatorState::Off => write!(f, "off"),
            ActuatorState::On => write!(f, "on"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("Output line {0} has not been configured")]
    NotConfigured(u8),
}

/// Narrow interface over the output line.
///
/// Implementations must tolerate calls from any task; the control glue holds
/// its state lock while writing, so writes never interleave.
pub trait Actuator: Send + Sync {
    /// Resets the line and configures it as an output, driven low.
    fn configure_as_output(&self) -> Result<(), ActuatorError>;

    /// Drives the line high (`true`) or low (`false`).
    fn set_actuator(&self, on: bool) -> Result<(), ActuatorError>;
}
