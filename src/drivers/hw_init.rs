//! One-shot hardware peripheral initialization and raw pin primitives.
//!
//! Configures ADC1 channels for the soil probes and the ultrasonic
//! ranger's trigger/echo pins using raw ESP-IDF sys calls.  Called once
//! from `main()` before the first wake cycle runs.  The rail and pump
//! enable pins are configured lazily by their owners through
//! [`GpioPort`](crate::app::ports::GpioPort).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the wake cycle; single-threaded.
    unsafe {
        init_adc()?;
        init_ranger()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only after `init_adc()` from the single wake
/// cycle thread.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    for ch in [pins::SOIL_MOISTURE_ADC_CH, pins::SOIL_TEMP_ADC_CH] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ch, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "hw_init: ADC1 configured (CH{}=moisture, CH{}=soil temp)",
        pins::SOIL_MOISTURE_ADC_CH,
        pins::SOIL_TEMP_ADC_CH
    );
    Ok(())
}

/// Raw 12-bit count, or `None` if the driver rejected the read.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; wake cycle thread only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.clamp(0, 4095) as u16)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Option<u16> {
    Some(2048)
}

// ── Ranger pins ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ranger() -> Result<(), HwInitError> {
    let trig = gpio_config_t {
        pin_bit_mask: 1u64 << pins::RANGER_TRIG_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&trig) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    unsafe { gpio_set_level(pins::RANGER_TRIG_GPIO, 0) };

    let echo = gpio_config_t {
        pin_bit_mask: 1u64 << pins::RANGER_ECHO_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&echo) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: ranger pins configured");
    Ok(())
}

/// One trigger pulse and a busy-wait measurement of the echo width.
///
/// The echo line idles low; the pulse must start within `max_echo_us`
/// of the trigger and finish within `max_echo_us` of its start.
#[cfg(target_os = "espidf")]
pub fn ranger_ping(max_echo_us: u32) -> Option<u32> {
    // SAFETY: ranger pins configured in init_ranger(); esp_timer_get_time
    // and gpio_get_level are plain register reads.
    unsafe {
        gpio_set_level(pins::RANGER_TRIG_GPIO, 0);
        esp_rom_delay_us(2);
        gpio_set_level(pins::RANGER_TRIG_GPIO, 1);
        esp_rom_delay_us(10);
        gpio_set_level(pins::RANGER_TRIG_GPIO, 0);

        let limit = i64::from(max_echo_us);
        let armed = esp_timer_get_time();
        while gpio_get_level(pins::RANGER_ECHO_GPIO) == 0 {
            if esp_timer_get_time() - armed > limit {
                return None;
            }
        }
        let rise = esp_timer_get_time();
        while gpio_get_level(pins::RANGER_ECHO_GPIO) != 0 {
            if esp_timer_get_time() - rise > limit {
                return None;
            }
        }
        u32::try_from(esp_timer_get_time() - rise).ok()
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ranger_ping(_max_echo_us: u32) -> Option<u32> {
    // 20 cm round trip.
    Some(20 * 57)
}

// ── GPIO outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn gpio_set_output(pin: i32) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: gpio_config on an output-capable pin from the cycle thread.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_set_output(_pin: i32) -> Result<(), HwInitError> {
    Ok(())
}

/// Return `pin` to a plain input with no pulls.
#[cfg(target_os = "espidf")]
pub fn gpio_float(pin: i32) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: as gpio_set_output().
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_float(_pin: i32) -> Result<(), HwInitError> {
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), HwInitError> {
    // SAFETY: gpio_set_level on a pin configured by gpio_set_output().
    let ret = unsafe { gpio_set_level(pin, u32::from(high)) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) -> Result<(), HwInitError> {
    Ok(())
}
