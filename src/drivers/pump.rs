//! Irrigation pump driver.
//!
//! The pump motor hangs off the switched 9–12 V rail and is gated by a
//! MOSFET on `PUMP_ENABLE_GPIO`.
//!
//! ## Power ordering
//!
//! ```text
//!   turn_on:   motor rail on ─▶ pre-charge ─▶ enable pin output, high
//!   turn_off:  enable pin floated ─▶ motor rail off
//! ```
//!
//! Driving the gate before the rail has charged browns out the logic
//! rail; dropping the rail with the gate still driven back-feeds the
//! motor driver.  The enable pin is floated rather than driven low so the
//! gate's own pull-down holds it off while the ESP32 sleeps.
//!
//! ## Dual-target design
//!
//! The driver holds no hardware handles of its own; it borrows the
//! [`PowerSequencer`]'s GPIO backend and delay, so the same code runs on
//! the ESP-IDF backend and against recording fakes on the host.

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::GpioPort;
use crate::error::Result;
use crate::power::{PowerChannel, PowerSequencer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Stopped,
    Running,
}

pub struct WaterPump {
    enable_pin: i32,
    precharge_ms: u32,
    state: PumpState,
}

impl WaterPump {
    pub fn new(enable_pin: i32, precharge_ms: u32) -> Self {
        Self {
            enable_pin,
            precharge_ms,
            state: PumpState::Stopped,
        }
    }

    /// Bring up the sequencer and park the enable pin.
    pub fn init<G: GpioPort, D: DelayNs>(&mut self, power: &mut PowerSequencer<G, D>) -> Result<()> {
        power.init()?;
        power.gpio_mut().float(self.enable_pin)?;
        self.state = PumpState::Stopped;
        Ok(())
    }

    pub fn turn_on<G: GpioPort, D: DelayNs>(&mut self, power: &mut PowerSequencer<G, D>) -> Result<()> {
        power.set(PowerChannel::Motor12v, true)?;
        power.delay_mut().delay_ms(self.precharge_ms);

        let gpio = power.gpio_mut();
        gpio.configure_output(self.enable_pin)?;
        gpio.write(self.enable_pin, true)?;

        self.state = PumpState::Running;
        info!("pump: on");
        Ok(())
    }

    /// Stop the pump.  The rail is dropped even if floating the enable
    /// pin fails; the first error is reported.
    pub fn turn_off<G: GpioPort, D: DelayNs>(&mut self, power: &mut PowerSequencer<G, D>) -> Result<()> {
        let floated = power.gpio_mut().float(self.enable_pin);
        let rail = power.set(PowerChannel::Motor12v, false);

        self.state = PumpState::Stopped;
        info!("pump: off");
        floated?;
        rail
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }
}
