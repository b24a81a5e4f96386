//! Line-oriented console over stdin
//!
//! Each line maps to one user action. Parsing is pure so the table can be
//! tested without a terminal.

use tuglight_core::{Command, GradientOrientation, ProtocolError, Rgb};

pub const HELP: &str = "\
commands:
  color RRGGBB             light the panel with one color
  gradient RRGGBB RRGGBB   blend from left to right
  pixels RRGGBB...         set pixels individually, in order
  panel <rows> <columns>   set the panel geometry
  gamma on|off             toggle gamma correction
  mode all|one             all pixels share the color, or only one
  orient horizontal|vertical|consecutive
  heap                     query free heap
  ping                     ping the device
  reset                    restart the device
  clear                    clear the message log
  help                     show this text
  quit                     close the connection and exit";

/// ANSI erase-display plus cursor-home
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// What one console line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(Command),
    Clear,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command {0:?} (try \"help\")")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("{field} must be a number between 0 and 65535, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error(transparent)]
    Color(#[from] ProtocolError),
}

pub fn parse_line(line: &str) -> Result<ConsoleInput, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(ConsoleInput::Empty);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("quit" | "exit", []) => return Ok(ConsoleInput::Quit),
        ("help" | "?", []) => return Ok(ConsoleInput::Help),
        ("clear", []) => return Ok(ConsoleInput::Clear),
        ("heap", []) => Command::QueryHeap,
        ("ping", []) => Command::Ping,
        ("reset", []) => Command::ResetDevice,

        ("color", [hex]) => Command::SetSingleColor(color(hex)?),
        ("color", _) => return Err(ConsoleError::Usage("color RRGGBB")),

        ("gradient", [left, right]) => Command::SetGradient {
            left: color(left)?,
            right: color(right)?,
        },
        ("gradient", _) => return Err(ConsoleError::Usage("gradient RRGGBB RRGGBB")),

        ("pixels", []) => return Err(ConsoleError::Usage("pixels RRGGBB...")),
        ("pixels", hexes) => Command::SetIndividualPixels(
            hexes
                .iter()
                .map(|hex| color(hex))
                .collect::<Result<_, _>>()?,
        ),

        ("panel", [rows, columns]) => Command::SetPanelGeometry {
            rows: number("rows", rows)?,
            columns: number("columns", columns)?,
        },
        ("panel", _) => return Err(ConsoleError::Usage("panel <rows> <columns>")),

        ("gamma", ["on"]) => Command::SetOutputMode {
            gamma_correction: true,
        },
        ("gamma", ["off"]) => Command::SetOutputMode {
            gamma_correction: false,
        },
        ("gamma", _) => return Err(ConsoleError::Usage("gamma on|off")),

        ("mode", ["all"]) => Command::SetColorMode { all_same: true },
        ("mode", ["one"]) => Command::SetColorMode { all_same: false },
        ("mode", _) => return Err(ConsoleError::Usage("mode all|one")),

        ("orient", [name]) => match *name {
            "horizontal" => Command::SetGradientOrientation(GradientOrientation::Horizontal),
            "vertical" => Command::SetGradientOrientation(GradientOrientation::Vertical),
            "consecutive" => Command::SetGradientOrientation(GradientOrientation::Consecutive),
            _ => return Err(ConsoleError::Usage("orient horizontal|vertical|consecutive")),
        },
        ("orient", _) => return Err(ConsoleError::Usage("orient horizontal|vertical|consecutive")),

        _ => return Err(ConsoleError::UnknownCommand(verb.to_string())),
    };
    Ok(ConsoleInput::Command(command))
}

/// Output that empties the message log; JSON output is never cleared
pub fn clear_sequence(json: bool) -> Option<&'static str> {
    (!json).then_some(CLEAR_SCREEN)
}

/// Color pickers emit `#RRGGBB`; the device wants the bare digits
fn color(input: &str) -> Result<Rgb, ProtocolError> {
    Rgb::from_hex(input.strip_prefix('#').unwrap_or(input))
}

fn number(field: &'static str, input: &str) -> Result<u16, ConsoleError> {
    input.parse().map_err(|_| ConsoleError::InvalidNumber {
        field,
        value: input.to_string(),
    })
}
