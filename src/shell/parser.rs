//! Shell line parser.
//!
//! Lines are whitespace-separated tokens: a command name followed by
//! positional arguments.  Names match exactly; near misses are reported
//! with a suggestion so an operator on a laggy telnet link can retype.

use core::fmt;

/// Maximum edit distance for a "Did you mean" hint.
pub const SUGGEST_DISTANCE: usize = 2;

/// Static description of one command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub args: &'static [&'static str],
    pub description: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "ping",
        args: &[],
        description: " Ping the CLI, return Pong",
    },
    CommandSpec {
        name: "close",
        args: &[],
        description: " Closes the telnet connection and restarts the greenhouse app",
    },
    CommandSpec {
        name: "setWaterHours",
        args: &["startHour", "endHour"],
        description: " Sets the hours that the plants can be watered",
    },
    CommandSpec {
        name: "setWaterMinSOC",
        args: &["minSOC"],
        description: " Sets the minimum SOC where the plants can be watered",
    },
    CommandSpec {
        name: "waterLevelCal",
        args: &["emptyCm", "fullCm"],
        description: " Sets the calibration for water level. The empty and full distances are the \
                      distances measured when the water reservoir is empty and full respectively",
    },
    CommandSpec {
        name: "waterDistance",
        args: &[],
        description: " Get the distance to the water as measured by the water level sensor",
    },
    CommandSpec {
        name: "waterPercent",
        args: &[],
        description: " Get the water level",
    },
    CommandSpec {
        name: "help",
        args: &[],
        description: " Get CLI help",
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Ping,
    Close,
    SetWaterHours { start: f64, end: f64 },
    SetWaterMinSoc { min_soc: f64 },
    WaterLevelCal { empty_cm: f64, full_cm: f64 },
    WaterDistance,
    WaterPercent,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing but whitespace.
    Empty,
    /// No command by that name.  Carries the closest known name, if any.
    NotFound {
        name: heapless::String<32>,
        suggestion: Option<&'static str>,
    },
    /// Fewer arguments than the command takes.
    MissingArgument { command: &'static str, arg: &'static str },
    /// More arguments than the command takes.
    UnexpectedArgument { command: &'static str, value: heapless::String<32> },
    /// An argument that should be a number is not.
    NotANumber { command: &'static str, arg: &'static str },
}

impl ParseError {
    /// Command name to offer back to the operator.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::NotFound { suggestion, .. } => *suggestion,
            Self::MissingArgument { command, .. }
            | Self::UnexpectedArgument { command, .. }
            | Self::NotANumber { command, .. } => Some(command),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty input"),
            Self::NotFound { name, .. } => write!(f, "Command not found: \"{}\"", name),
            Self::MissingArgument { command, arg } => {
                write!(f, "Missing argument \"{}\" for {}", arg, command)
            }
            Self::UnexpectedArgument { command, value } => {
                write!(f, "Unknown argument \"{}\" for {}", value, command)
            }
            Self::NotANumber { command, arg } => {
                write!(f, "Argument \"{}\" for {} is not a number", arg, command)
            }
        }
    }
}

fn truncated(s: &str) -> heapless::String<32> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Case-insensitive Levenshtein distance, bounded by the shortest name
/// buffer the parser keeps.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: heapless::Vec<char, 32> = b.chars().take(32).map(|c| c.to_ascii_lowercase()).collect();
    let mut prev: heapless::Vec<usize, 33> = (0..=b.len()).collect();
    let mut cur: heapless::Vec<usize, 33> = heapless::Vec::new();

    for (i, ca) in a.chars().take(32).map(|c| c.to_ascii_lowercase()).enumerate() {
        cur.clear();
        // Lengths are bounded by the 32-char take above.
        let _ = cur.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let subst = prev[j] + usize::from(ca != *cb);
            let del = prev[j + 1] + 1;
            let ins = cur[j] + 1;
            let _ = cur.push(subst.min(del).min(ins));
        }
        core::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Closest known command within [`SUGGEST_DISTANCE`].
pub fn suggest(name: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .map(|c| (edit_distance(name, c.name), c.name))
        .filter(|&(d, _)| d <= SUGGEST_DISTANCE)
        .min_by_key(|&(d, _)| d)
        .map(|(_, n)| n)
}

fn number(spec: &CommandSpec, idx: usize, raw: &str) -> Result<f64, ParseError> {
    raw.parse::<f64>().map_err(|_| ParseError::NotANumber {
        command: spec.name,
        arg: spec.args[idx],
    })
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Err(ParseError::Empty);
    };

    let Some(spec) = COMMANDS.iter().find(|c| c.name == name) else {
        return Err(ParseError::NotFound {
            name: truncated(name),
            suggestion: suggest(name),
        });
    };

    let mut args: heapless::Vec<&str, 2> = heapless::Vec::new();
    for tok in tokens {
        if args.len() == spec.args.len() || args.push(tok).is_err() {
            return Err(ParseError::UnexpectedArgument {
                command: spec.name,
                value: truncated(tok),
            });
        }
    }
    if let Some(&missing) = spec.args.get(args.len()) {
        return Err(ParseError::MissingArgument {
            command: spec.name,
            arg: missing,
        });
    }

    Ok(match spec.name {
        "ping" => Command::Ping,
        "close" => Command::Close,
        "setWaterHours" => Command::SetWaterHours {
            start: number(spec, 0, args[0])?,
            end: number(spec, 1, args[1])?,
        },
        "setWaterMinSOC" => Command::SetWaterMinSoc {
            min_soc: number(spec, 0, args[0])?,
        },
        "waterLevelCal" => Command::WaterLevelCal {
            empty_cm: number(spec, 0, args[0])?,
            full_cm: number(spec, 1, args[1])?,
        },
        "waterDistance" => Command::WaterDistance,
        "waterPercent" => Command::WaterPercent,
        _ => Command::Help,
    })
}
