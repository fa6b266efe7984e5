//! Operator shell sessions: over a real loopback telnet socket, and
//! against storage that fails mid-update.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use greenhouse::adapters::telnet::TelnetShell;
use greenhouse::sensors::water_level::WaterLevelSensor;
use greenhouse::settings::IrrigationSettings;
use greenhouse::shell::{self, SessionEnd, ShellContext};

use crate::mock_hw::{FlakyStore, MockRanger, ScriptedShell};

fn free_port() -> u16 {
    let l = TcpListener::bind("127.0.0.1:0").unwrap();
    l.local_addr().unwrap().port()
}

/// Connect (retrying until the listener is up), send `input`, and
/// collect everything until the server hangs up.
fn operator(port: u16, input: &'static [u8]) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut stream = loop {
            match TcpStream::connect(("127.0.0.1", port)) {
                Ok(s) => break s,
                Err(_) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(20));
                }
                Err(e) => panic!("could not reach shell: {e}"),
            }
        };
        stream.write_all(input).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    })
}

#[test]
fn telnet_session_end_to_end() {
    let port = free_port();
    // Telnet negotiation bytes ahead of the first command are ignored.
    let client = operator(port, b"\xff\xfb\x1fping\r\nwaterDistance\r\npnig\r\nclose\r\n");

    let mut store = FlakyStore::new();
    let mut water = WaterLevelSensor::new(MockRanger::at_cm(33)).unwrap();
    water.init(&store).unwrap();
    let mut settings = IrrigationSettings::new().unwrap();
    settings.load(&store).unwrap();

    let mut telnet = TelnetShell::new(port);
    let mut ctx = ShellContext {
        water: &mut water,
        settings: &mut settings,
        store: &mut store,
    };
    let end = shell::serve(&mut telnet, &mut ctx, 5_000).unwrap();
    assert_eq!(end, SessionEnd::Closed);

    let transcript = client.join().unwrap();
    let lines: Vec<&str> = transcript.lines().map(str::trim_end).collect();
    assert_eq!(
        lines,
        vec![
            "> pong",
            "> Water Distance 33 cm",
            "ERROR: Command not found: \"pnig\"",
            "Did you mean \"ping\"?",
            "> Goodbye",
        ]
    );
}

#[test]
fn failed_calibration_write_keeps_the_old_pair() {
    let mut store = FlakyStore::new();
    store.seed("waterEmpty", 50.0);
    store.seed("waterFull", 8.0);
    store.fail_write_key = Some("waterFull");

    let mut water = WaterLevelSensor::new(MockRanger::at_cm(20)).unwrap();
    water.init(&store).unwrap();
    let mut settings = IrrigationSettings::new().unwrap();
    settings.load(&store).unwrap();

    let mut port = ScriptedShell::with_lines(&["waterLevelCal 80 10", "waterPercent"]);
    let mut ctx = ShellContext {
        water: &mut water,
        settings: &mut settings,
        store: &mut store,
    };
    assert_eq!(shell::serve(&mut port, &mut ctx, 1_000).unwrap(), SessionEnd::Inactive);

    assert!(port.saw("> Fail: failed to update water level cal"));
    // 20 cm against the untouched 8/50 cm calibration.
    assert!(port.saw("> Water Level 71.43 %"));
    assert_eq!(store.stored("waterEmpty"), Some(50.0));
    assert_eq!(store.stored("waterFull"), Some(8.0));
    assert_eq!(water.calibration(), (8.0, 50.0));
}

#[test]
fn window_and_soc_set_in_shell_survive_a_reload() {
    let mut store = FlakyStore::new();
    let mut water = WaterLevelSensor::new(MockRanger::silent()).unwrap();
    let mut settings = IrrigationSettings::new().unwrap();
    settings.load(&store).unwrap();

    let mut port = ScriptedShell::with_lines(&["setWaterHours 7 19", "setWaterMinSOC 35", "close"]);
    let mut ctx = ShellContext {
        water: &mut water,
        settings: &mut settings,
        store: &mut store,
    };
    shell::serve(&mut port, &mut ctx, 1_000).unwrap();

    let mut reloaded = IrrigationSettings::new().unwrap();
    reloaded.load(&store).unwrap();
    assert_eq!(reloaded.water_hours(), (7.0, 19.0));
    assert_eq!(reloaded.min_soc(), 35.0);
    assert!(!reloaded.watering_permitted(Some(19), 80.0));
    assert!(!reloaded.watering_permitted(Some(12), 34.0));
}

#[test]
fn misspelt_command_with_arguments_gets_a_hint() {
    let mut store = FlakyStore::new();
    let mut water = WaterLevelSensor::new(MockRanger::silent()).unwrap();
    let mut settings = IrrigationSettings::new().unwrap();

    let mut port = ScriptedShell::with_lines(&["setWaterHour 6 20"]);
    let mut ctx = ShellContext {
        water: &mut water,
        settings: &mut settings,
        store: &mut store,
    };
    shell::serve(&mut port, &mut ctx, 1_000).unwrap();

    assert!(port.saw("Did you mean \"setWaterHours\"?"));
    assert_eq!(store.stored("waterStartHr"), None);
}

#[test]
fn unreachable_calibration_is_refused_and_ranging_continues() {
    let mut store = FlakyStore::new();
    let mut water = WaterLevelSensor::new(MockRanger::at_cm(33)).unwrap();
    water.init(&store).unwrap();
    let mut settings = IrrigationSettings::new().unwrap();

    let mut port = ScriptedShell::with_lines(&[
        "waterLevelCal inf 10",
        "waterLevelCal 1e8 10",
        "waterDistance",
        "waterPercent",
        "close",
    ]);
    let mut ctx = ShellContext {
        water: &mut water,
        settings: &mut settings,
        store: &mut store,
    };
    assert_eq!(shell::serve(&mut port, &mut ctx, 1_000).unwrap(), SessionEnd::Closed);

    assert!(port.saw("> Fail: failed to update water level cal"));
    assert!(port.saw("> Water Distance 33 cm"));
    // 33 cm against the default 5/60 cm calibration.
    assert!(port.saw("> Water Level 49.09 %"));
    assert_eq!(store.stored("waterEmpty"), None);
    assert_eq!(water.calibration(), (5.0, 60.0));
}
