//! Power rail sequencing.
//!
//! Two independently switched rails feed the board:
//!
//! ```text
//!   battery ──┬── [RAIL_3V3_GPIO]   ──▶ 3V3 sensor rail (I2C chips, ranger, probes)
//!             └── [RAIL_MOTOR_GPIO] ──▶ 9–12 V motor rail (irrigation pump)
//! ```
//!
//! Every switch is followed by a fixed settle delay so callers may touch
//! downstream hardware as soon as [`PowerSequencer::set_channel`] returns.
//! Rails are dropped before deep sleep to keep the quiescent draw at the
//! regulator floor.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::app::ports::GpioPort;
use crate::error::{Error, Result};
use crate::pins;

/// A switchable power output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerChannel {
    /// 3V3 logic/sensor rail.
    Logic3v3 = 0,
    /// 9–12 V pump motor rail.
    Motor12v = 1,
}

impl PowerChannel {
    pub const ALL: [Self; 2] = [Self::Logic3v3, Self::Motor12v];

    pub const fn gpio(self) -> i32 {
        match self {
            Self::Logic3v3 => pins::RAIL_3V3_GPIO,
            Self::Motor12v => pins::RAIL_MOTOR_GPIO,
        }
    }
}

impl TryFrom<u8> for PowerChannel {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Logic3v3),
            1 => Ok(Self::Motor12v),
            _ => Err(Error::InvalidParams("unknown power channel")),
        }
    }
}

/// Owns the rail-enable GPIOs.
pub struct PowerSequencer<G, D> {
    gpio: G,
    delay: D,
    settle_ms: u32,
    initialised: bool,
}

impl<G: GpioPort, D: DelayNs> PowerSequencer<G, D> {
    pub fn new(gpio: G, delay: D, settle_ms: u32) -> Self {
        Self {
            gpio,
            delay,
            settle_ms,
            initialised: false,
        }
    }

    /// Configure the rail-enable lines as outputs.  Repeat calls are no-ops.
    pub fn init(&mut self) -> Result<()> {
        if self.initialised {
            return Ok(());
        }
        for ch in PowerChannel::ALL {
            self.gpio.configure_output(ch.gpio())?;
        }
        self.initialised = true;
        info!("power: rails configured");
        Ok(())
    }

    /// Switch the rail with raw id `channel`, then wait for it to settle.
    ///
    /// Unknown ids fail with `InvalidParams` before any GPIO is touched.
    pub fn set_channel(&mut self, channel: u8, enable: bool) -> Result<()> {
        let ch = PowerChannel::try_from(channel)?;
        self.set(ch, enable)
    }

    /// Typed form of [`set_channel`](Self::set_channel).
    pub fn set(&mut self, channel: PowerChannel, enable: bool) -> Result<()> {
        self.init()?;
        self.gpio.write(channel.gpio(), enable)?;
        self.delay.delay_ms(self.settle_ms);
        debug!("power: {:?} -> {}", channel, if enable { "on" } else { "off" });
        Ok(())
    }

    /// Drop every rail.  Attempts all rails and reports the first failure.
    pub fn all_off(&mut self) -> Result<()> {
        let mut first_err = None;
        for ch in PowerChannel::ALL {
            if let Err(e) = self.set(ch, false) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Direct access to the GPIO backend for components sharing it.
    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }
}
