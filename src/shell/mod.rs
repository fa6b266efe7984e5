//! Remote operator shell.
//!
//! A line-oriented session served over [`ShellPort`] (telnet on hardware).
//! Every reply line starts with `>`; parse failures are reported as
//! `ERROR: …` with an optional `Did you mean "<cmd>"?` hint.
//!
//! ```text
//!   open ─▶ read_line ─▶ parse ─▶ execute ─▶ reply ─┐
//!             ▲                                     │
//!             └─────────────────────────────────────┘
//!   ends on: close · inactivity timeout · peer disconnect
//! ```

pub mod parser;

use core::fmt::Write;

use log::{info, warn};

use crate::app::ports::{RangingPort, ShellPort, StoragePort};
use crate::error::{CommsError, Result};
use crate::sensors::water_level::WaterLevelSensor;
use crate::settings::IrrigationSettings;
use parser::{COMMANDS, Command, ParseError};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Closed,
    Inactive,
    Disconnected,
}

/// What the shell may touch while a session is open.
pub struct ShellContext<'a, R, St> {
    pub water: &'a mut WaterLevelSensor<R>,
    pub settings: &'a mut IrrigationSettings,
    pub store: &'a mut St,
}

type Line = heapless::String<192>;

fn line(args: core::fmt::Arguments<'_>) -> Line {
    let mut s = Line::new();
    // Overlong replies are truncated.
    let _ = s.write_fmt(args);
    s
}

/// Serve one session until it ends.
///
/// Returns `Err` only if the session could not be opened or a reply could
/// not be written; a dropped peer is a normal [`SessionEnd`].
pub fn serve<P, R, St>(port: &mut P, ctx: &mut ShellContext<'_, R, St>, inactivity_ms: u32) -> Result<SessionEnd>
where
    P: ShellPort,
    R: RangingPort,
    St: StoragePort,
{
    port.open()?;
    info!("shell: listening");

    let end = loop {
        let input = match port.read_line(inactivity_ms) {
            Ok(Some(input)) => input,
            Ok(None) => break SessionEnd::Inactive,
            Err(CommsError::ShellDisconnected) => break SessionEnd::Disconnected,
            Err(e) => {
                port.close();
                return Err(e.into());
            }
        };

        match respond(port, ctx, &input) {
            Ok(true) => break SessionEnd::Closed,
            Ok(false) => {}
            Err(CommsError::ShellDisconnected) => break SessionEnd::Disconnected,
            Err(e) => {
                port.close();
                return Err(e.into());
            }
        }
    };

    port.close();
    info!("shell: session ended ({:?})", end);
    Ok(end)
}

/// Handle one input line.  Returns `true` when the operator asked to close.
fn respond<P, R, St>(
    port: &mut P,
    ctx: &mut ShellContext<'_, R, St>,
    input: &str,
) -> core::result::Result<bool, CommsError>
where
    P: ShellPort,
    R: RangingPort,
    St: StoragePort,
{
    match parser::parse(input) {
        Ok(cmd) => execute(port, ctx, cmd),
        Err(ParseError::Empty) => Ok(false),
        Err(e) => {
            port.write_line(&line(format_args!("ERROR: {}", e)))?;
            if let Some(cmd) = e.suggestion() {
                port.write_line(&line(format_args!("Did you mean \"{}\"?", cmd)))?;
            }
            Ok(false)
        }
    }
}

fn outcome(port: &mut impl ShellPort, res: Result<()>, what: &str) -> core::result::Result<(), CommsError> {
    match res {
        Ok(()) => port.write_line(&line(format_args!("> Success: updated {}", what))),
        Err(e) => {
            warn!("shell: update {} failed: {}", what, e);
            port.write_line(&line(format_args!("> Fail: failed to update {}", what)))
        }
    }
}

fn execute<P, R, St>(
    port: &mut P,
    ctx: &mut ShellContext<'_, R, St>,
    cmd: Command,
) -> core::result::Result<bool, CommsError>
where
    P: ShellPort,
    R: RangingPort,
    St: StoragePort,
{
    match cmd {
        Command::Ping => port.write_line("> pong")?,
        Command::Close => {
            port.write_line("> Goodbye")?;
            return Ok(true);
        }
        Command::Help => {
            port.write_line("Help:")?;
            for spec in COMMANDS {
                let mut usage = Line::new();
                let _ = usage.push_str(spec.name);
                for arg in spec.args {
                    let _ = write!(usage, " <{}>", arg);
                }
                port.write_line(&usage)?;
                port.write_line(spec.description)?;
            }
        }
        Command::SetWaterHours { start, end } => {
            let res = ctx.settings.set_water_hours(&mut *ctx.store, start, end);
            outcome(port, res, "water hours")?;
        }
        Command::SetWaterMinSoc { min_soc } => {
            let res = ctx.settings.set_min_soc(&mut *ctx.store, min_soc);
            outcome(port, res, "min water SOC")?;
        }
        Command::WaterLevelCal { empty_cm, full_cm } => {
            let res = ctx.water.update_calibration(&mut *ctx.store, full_cm, empty_cm);
            outcome(port, res, "water level cal")?;
        }
        Command::WaterDistance => {
            let cm = ctx.water.water_distance_cm().unwrap_or(0);
            port.write_line(&line(format_args!("> Water Distance {} cm", cm)))?;
        }
        Command::WaterPercent => {
            let mut pct = 0.0;
            match ctx.water.water_level_percent(&mut pct) {
                Ok(()) => port.write_line(&line(format_args!("> Water Level {:.2} %", pct)))?,
                Err(e) => port.write_line(&line(format_args!("> Water Level unavailable: {}", e)))?,
            }
        }
    }
    Ok(false)
}
