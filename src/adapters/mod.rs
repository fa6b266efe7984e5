//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements        | Connects to                   |
//! |---------------|-------------------|-------------------------------|
//! | `hardware`    | GpioPort          | ESP32 GPIO (rails, pump)      |
//! |               | AdcPort           | ESP32 ADC1 (soil probes)      |
//! |               | RangingPort       | Ultrasonic trig/echo pins     |
//! | `i2c_sensors` | SensorDriverPort  | BME280, CCS811, LC709203F, INA219 |
//! | `log_sink`    | EventSink         | Serial log output             |
//! |               | LogForwardPort    | Remote log queue              |
//! | `mqtt`        | PubSubPort        | Telemetry service over MQTT   |
//! | `nvs`         | ConfigPort        | NVS / in-memory store         |
//! |               | StoragePort       |                               |
//! | `telnet`      | ShellPort         | TCP port 23                   |
//! | `time`        | ClockPort         | ESP32 system timer            |
//! |               | SleepPort         | RTC deep sleep                |
//! | `wifi`        | ConnectivityPort  | ESP-IDF WiFi STA              |

pub mod hardware;
pub mod i2c_sensors;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod telnet;
pub mod time;
pub mod wifi;
