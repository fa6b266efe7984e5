//! Feed naming and the remote config mirror.
//!
//! Every logical value lives on its own topic, `<user>/feeds/<feed>`.
//! Config feeds pair that topic with `<user>/feeds/<feed>/get`; publishing
//! anything on the get topic makes the service re-send the current value
//! on the plain ("set") topic.

pub mod mirror;

use core::fmt::Write;

use crate::app::ports::MAX_TOPIC_LEN;
use crate::error::{Error, Result};

pub type Topic = heapless::String<MAX_TOPIC_LEN>;

/// Every feed the firmware reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    // Telemetry
    BatterySoc,
    BatteryCellVoltage,
    Co2,
    AirTemperature,
    AirHumidity,
    SoilTemperature,
    SoilMoisture,
    WaterLevel,
    SolarPanelVoltage,
    SolarPanelCurrent,
    SolarPanelPower,
    // Status
    Log,
    LocalIp,
    // Config
    PumpOverride,
    ShellEnable,
    UpdateConfig,
    MoistureThreshold,
    WateringDuration,
}

impl Feed {
    pub const fn name(self) -> &'static str {
        match self {
            Self::BatterySoc => "battery-soc",
            Self::BatteryCellVoltage => "battery-cell-voltage",
            Self::Co2 => "co2",
            Self::AirTemperature => "air-temperature",
            Self::AirHumidity => "air-humidity",
            Self::SoilTemperature => "soil-temperature",
            Self::SoilMoisture => "soil-moisture",
            Self::WaterLevel => "water-level",
            Self::SolarPanelVoltage => "solar-panel-voltage",
            Self::SolarPanelCurrent => "solar-panel-current",
            Self::SolarPanelPower => "solar-panel-power",
            Self::Log => "greenhouse-log",
            Self::LocalIp => "greenhouse-ip",
            Self::PumpOverride => "pump-control-override",
            Self::ShellEnable => "telnet-enable",
            Self::UpdateConfig => "update-config",
            Self::MoistureThreshold => "soil-moisture-threshold",
            Self::WateringDuration => "watering-duration",
        }
    }

    /// `<user>/feeds/<feed>`
    pub fn topic(self, user: &str) -> Result<Topic> {
        let mut t = Topic::new();
        write!(t, "{}/feeds/{}", user, self.name())
            .map_err(|_| Error::InvalidParams("feed topic too long"))?;
        Ok(t)
    }

    /// `<user>/feeds/<feed>/get`
    pub fn get_topic(self, user: &str) -> Result<Topic> {
        let mut t = self.topic(user)?;
        t.push_str("/get")
            .map_err(|_| Error::InvalidParams("feed topic too long"))?;
        Ok(t)
    }
}

/// Render a reading the way every telemetry feed expects: two decimals.
pub fn format_reading(value: f64) -> heapless::String<32> {
    let mut s = heapless::String::new();
    // 32 bytes covers any f64 in {:.2} short of the extreme exponents,
    // which no sensor produces.
    let _ = write!(s, "{value:.2}");
    s
}
