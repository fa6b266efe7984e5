//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`].  The coordinator calls
//! [`begin`](ConnectivityPort::begin) once per wake and then polls
//! [`is_connected`](ConnectivityPort::is_connected) on its own schedule,
//! so nothing here blocks.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in STA mode.
//! - **all other targets**: simulation that associates after a fixed
//!   number of polls.

use core::net::Ipv4Addr;
#[cfg(not(target_os = "espidf"))]
use core::cell::Cell;

use log::info;

use crate::app::ports::{ConnectivityError, ConnectivityPort};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// Space through tilde.
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    driver: Option<esp_idf_svc::wifi::EspWifi<'static>>,
    /// Simulation: polls remaining until association completes.
    #[cfg(not(target_os = "espidf"))]
    sim_polls_left: Cell<Option<u8>>,
}

impl WifiAdapter {
    /// Validate and hold the station credentials.
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut s = heapless::String::new();
        s.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        let mut p = heapless::String::new();
        p.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        Ok(Self {
            ssid: s,
            password: p,
            #[cfg(target_os = "espidf")]
            driver: None,
            #[cfg(not(target_os = "espidf"))]
            sim_polls_left: Cell::new(None),
        })
    }

    /// Hand over the radio driver.  Must happen before `begin()`.
    #[cfg(target_os = "espidf")]
    pub fn with_driver(mut self, driver: esp_idf_svc::wifi::EspWifi<'static>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }
}

#[cfg(target_os = "espidf")]
impl ConnectivityPort for WifiAdapter {
    fn begin(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let driver = self.driver.as_mut().ok_or(ConnectivityError::ConnectionFailed)?;
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        let fail = |e: esp_idf_svc::sys::EspError| {
            log::error!("WiFi: {}", e);
            ConnectivityError::ConnectionFailed
        };
        driver.set_configuration(&conf).map_err(fail)?;
        if !driver.is_started().map_err(fail)? {
            driver.start().map_err(fail)?;
        }
        driver.connect().map_err(fail)?;
        info!("WiFi: connecting to '{}'", self.ssid);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.driver
            .as_ref()
            .and_then(|d| d.is_up().ok())
            .unwrap_or(false)
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        let info = self.driver.as_ref()?.sta_netif().get_ip_info().ok()?;
        Some(Ipv4Addr::from(info.ip.octets()))
    }
}

/// Polls the simulation needs before reporting association.
#[cfg(not(target_os = "espidf"))]
const SIM_ASSOCIATE_POLLS: u8 = 2;

#[cfg(not(target_os = "espidf"))]
impl ConnectivityPort for WifiAdapter {
    fn begin(&mut self) -> Result<(), ConnectivityError> {
        info!("WiFi(sim): connecting to '{}'", self.ssid);
        self.sim_polls_left.set(Some(SIM_ASSOCIATE_POLLS));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        match self.sim_polls_left.get() {
            None => false,
            Some(0) => true,
            Some(n) => {
                self.sim_polls_left.set(Some(n - 1));
                false
            }
        }
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        (self.sim_polls_left.get() == Some(0)).then_some(Ipv4Addr::new(192, 168, 1, 50))
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
