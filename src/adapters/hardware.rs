//! Hardware adapter: bridges board pins to the domain port traits.
//!
//! Thin wrappers over [`hw_init`] primitives for [`GpioPort`],
//! [`AdcPort`] and [`RangingPort`].  This is the only module besides
//! `hw_init` that touches actual pins.  On non-espidf targets the
//! primitives are cfg-gated simulation stubs, so these types still work
//! in host builds.

use log::warn;

use crate::app::ports::{AdcPort, GpioPort, RangingPort};
use crate::drivers::hw_init;
use crate::error::{ActuatorError, SensorError};

/// Rail enables and the pump gate.
#[derive(Default)]
pub struct BoardGpio;

impl GpioPort for BoardGpio {
    fn configure_output(&mut self, pin: i32) -> Result<(), ActuatorError> {
        hw_init::gpio_set_output(pin).map_err(|e| {
            warn!("gpio: {} on pin {}", e, pin);
            ActuatorError::GpioConfigFailed
        })
    }

    fn write(&mut self, pin: i32, high: bool) -> Result<(), ActuatorError> {
        hw_init::gpio_write(pin, high).map_err(|e| {
            warn!("gpio: {} on pin {}", e, pin);
            ActuatorError::GpioWriteFailed
        })
    }

    fn float(&mut self, pin: i32) -> Result<(), ActuatorError> {
        hw_init::gpio_float(pin).map_err(|e| {
            warn!("gpio: {} on pin {}", e, pin);
            ActuatorError::GpioConfigFailed
        })
    }
}

/// ADC1 oneshot reads for the soil probes.
#[derive(Default)]
pub struct BoardAdc;

impl AdcPort for BoardAdc {
    fn read_raw(&mut self, channel: u32) -> Result<u16, SensorError> {
        hw_init::adc1_read(channel).ok_or(SensorError::AdcReadFailed)
    }
}

/// HC-SR04 style ranger on the trigger/echo pins.
#[derive(Default)]
pub struct UltrasonicRanger;

impl RangingPort for UltrasonicRanger {
    fn ping_echo_us(&mut self, max_echo_us: u32) -> Option<u32> {
        hw_init::ranger_ping(max_echo_us)
    }
}
