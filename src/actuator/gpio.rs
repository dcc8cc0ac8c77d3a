use parking_lot::Mutex;
use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, info};

use super::{Actuator, ActuatorError};

/// Output line backed by a BCM GPIO pin.
pub struct GpioActuator {
    pin: u8,
    output: Mutex<Option<OutputPin>>,
}

impl GpioActuator {
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            output: Mutex::new(None),
        }
    }
}

impl Actuator for GpioActuator {
    fn configure_as_output(&self) -> Result<(), ActuatorError> {
        let mut output = self.output.lock();
        // Dropping an existing OutputPin resets the line first.
        output.take();

        info!("Configuring GPIO {} as output", self.pin);
        let pin = Gpio::new()?.get(self.pin)?.into_output_low();
        *output = Some(pin);
        Ok(())
    }

    fn set_actuator(&self, on: bool) -> Result<(), ActuatorError> {
        let mut output = self.output.lock();
        let pin = output
            .as_mut()
            .ok_or(ActuatorError::NotConfigured(self.pin))?;

        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
        debug!("GPIO {} set {}", self.pin, if on { "high" } else { "low" });
        Ok(())
    }
}

/// Output line that only logs level changes.
///
/// Used on development hosts where `/dev/gpiomem` is not available.
pub struct LogActuator {
    pin: u8,
    level: Mutex<Option<bool>>,
}

impl LogActuator {
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            level: Mutex::new(None),
        }
    }

    /// Current simulated level, `None` until configured.
    pub fn level(&self) -> Option<bool> {
        *self.level.lock()
    }
}

impl Actuator for LogActuator {
    fn configure_as_output(&self) -> Result<(), ActuatorError> {
        info!("Simulated line {} configured as output (low)", self.pin);
        *self.level.lock() = Some(false);
        Ok(())
    }

    fn set_actuator(&self, on: bool) -> Result<(), ActuatorError> {
        let mut level = self.level.lock();
        match level.as_mut() {
            Some(current) => {
                *current = on;
                info!(
                    "Simulated line {} set {}",
                    self.pin,
                    if on { "high" } else { "low" }
                );
                Ok(())
            }
            None => Err(ActuatorError::NotConfigured(self.pin)),
        }
    }
}
