pub mod error;

use error::HwError;
use lifter_traits::{Actuator, Line};

/// How a relay line is returned to "button not pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayRelease {
    /// Reconfigure the pin as an input with no bias.
    #[default]
    HighZ,
    /// Keep the pin as an output at the inactive level.
    Inactive,
}

/// Simulated actuator implementation
///
/// Mirrors the relay interlock of the GPIO backend so that simulated runs
/// fail the same way hardware would.
#[derive(Debug, Default)]
pub struct SimulatedActuator {
    driven: Option<Line>,
    drives: u32,
    releases: u32,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line currently held active, if any.
    pub fn driven(&self) -> Option<Line> {
        self.driven
    }

    pub fn drive_count(&self) -> u32 {
        self.drives
    }

    pub fn release_count(&self) -> u32 {
        self.releases
    }
}

impl Actuator for SimulatedActuator {
    fn drive(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(active) = self.driven
            && active != line
        {
            return Err(Box::new(HwError::Interlock {
                requested: line,
                active,
            }));
        }
        self.driven = Some(line);
        self.drives += 1;
        tracing::info!(%line, "relay driven (simulated)");
        Ok(())
    }

    fn release(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.driven == Some(line) {
            self.driven = None;
            tracing::info!(%line, "relay released (simulated)");
        }
        self.releases += 1;
        Ok(())
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use relay::GpioRelayActuator;

#[cfg(all(feature = "hardware", target_os = "linux"))]
mod relay {
    use super::RelayRelease;
    use crate::error::{HwError, Result};
    use lifter_traits::{Actuator, Line};
    use rppal::gpio::{Bias, Gpio, IoPin, Level, Mode};

    /// Two relay lines on Raspberry Pi GPIO, one per controller button.
    pub struct GpioRelayActuator {
        up: IoPin,
        down: IoPin,
        active: Level,
        release_mode: RelayRelease,
        driven: Option<Line>,
    }

    impl GpioRelayActuator {
        pub fn new(
            up_pin: u8,
            down_pin: u8,
            active_low: bool,
            release_mode: RelayRelease,
        ) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))?;
            let open = |pin: u8| -> Result<IoPin> {
                let mut io = gpio
                    .get(pin)
                    .map_err(|e| HwError::Gpio(format!("open relay pin {pin}: {e}")))?
                    .into_io(Mode::Input);
                // Restoring the boot-time mode on drop could re-press a button.
                io.set_reset_on_drop(false);
                Ok(io)
            };
            let mut this = Self {
                up: open(up_pin)?,
                down: open(down_pin)?,
                active: if active_low { Level::Low } else { Level::High },
                release_mode,
                driven: None,
            };
            this.release_pin(Line::Up);
            this.release_pin(Line::Down);
            tracing::info!(up_pin, down_pin, active_low, ?release_mode, "relay lines ready");
            Ok(this)
        }

        fn pin(&mut self, line: Line) -> &mut IoPin {
            match line {
                Line::Up => &mut self.up,
                Line::Down => &mut self.down,
            }
        }

        fn inactive(&self) -> Level {
            match self.active {
                Level::Low => Level::High,
                Level::High => Level::Low,
            }
        }

        fn release_pin(&mut self, line: Line) {
            let inactive = self.inactive();
            let mode = self.release_mode;
            let pin = self.pin(line);
            match mode {
                RelayRelease::HighZ => {
                    pin.set_mode(Mode::Input);
                    pin.set_bias(Bias::Off);
                }
                RelayRelease::Inactive => {
                    pin.write(inactive);
                    pin.set_mode(Mode::Output);
                }
            }
        }
    }

    impl Actuator for GpioRelayActuator {
        fn drive(&mut self, line: Line) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if let Some(active) = self.driven
                && active != line
            {
                return Err(Box::new(HwError::Interlock {
                    requested: line,
                    active,
                }));
            }
            let level = self.active;
            let pin = self.pin(line);
            // Latch the level before switching to output so the line never glitches.
            pin.write(level);
            pin.set_mode(Mode::Output);
            self.driven = Some(line);
            tracing::debug!(%line, "relay driven");
            Ok(())
        }

        fn release(&mut self, line: Line) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.release_pin(line);
            if self.driven == Some(line) {
                self.driven = None;
            }
            tracing::debug!(%line, "relay released");
            Ok(())
        }
    }

    impl Drop for GpioRelayActuator {
        fn drop(&mut self) {
            self.release_pin(Line::Up);
            self.release_pin(Line::Down);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_drive_and_release() {
        let mut act = SimulatedActuator::new();
        act.drive(Line::Up).unwrap();
        assert_eq!(act.driven(), Some(Line::Up));
        act.release(Line::Up).unwrap();
        assert_eq!(act.driven(), None);
        assert_eq!(act.drive_count(), 1);
        assert_eq!(act.release_count(), 1);
    }

    #[test]
    fn simulated_interlock_rejects_second_line() {
        let mut act = SimulatedActuator::new();
        act.drive(Line::Down).unwrap();
        let err = act.drive(Line::Up).expect_err("interlock");
        assert!(err.to_string().contains("refusing to drive up while down is driven"));
        assert_eq!(act.driven(), Some(Line::Down));
    }

    #[test]
    fn release_all_is_idempotent() {
        let mut act = SimulatedActuator::new();
        act.release_all().unwrap();
        act.release_all().unwrap();
        assert_eq!(act.driven(), None);
        assert_eq!(act.release_count(), 4);
    }
}
