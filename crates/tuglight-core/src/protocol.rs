//! WebSocket wire codec for the LED controller
//!
//! Every frame starts with an opcode: a leading character for text frames or a
//! leading tag byte for binary color frames. The rest of the frame is the
//! payload. Two deployed firmware generations disagree on the opcode tables and
//! on how colors travel, so the codec is parameterized by [`WireVariant`]:
//!
//! - `Textual`: colors as hex text (`s` + `RRGGBB`), heartbeat `p`, keep-alive `a`
//! - `Binary`: colors as tagged bytes (`[1, r, g, b]`), heartbeat `>`, keep-alive `<`
//!
//! Mode, geometry, heap, and reset commands are text frames in both variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Command, Frame, GradientOrientation, NO_DATA, Rgb, StatusMessage};

/// Binary tag for a single color frame
pub const TAG_SINGLE_COLOR: u8 = 1;

/// Binary tag for a two-color gradient frame
pub const TAG_GRADIENT: u8 = 2;

/// Binary tag for a per-pixel color frame
pub const TAG_PIXELS: u8 = 3;

/// Errors raised while building protocol values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The color is not exactly six hex digits
    #[error("invalid color {0:?}: expected 6 hex digits RRGGBB")]
    InvalidColor(String),

    /// The wire variant name is not recognized
    #[error("unknown wire variant {0:?}: expected \"binary\" or \"textual\"")]
    UnknownWireVariant(String),
}

/// Which of the two incompatible wire conventions a device speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireVariant {
    Binary,
    Textual,
}

impl WireVariant {
    /// Heartbeat sentinel used when the deployment does not override it
    pub fn default_heartbeat_token(&self) -> &'static str {
        match self {
            WireVariant::Binary => ">",
            WireVariant::Textual => "p",
        }
    }

    fn ping(&self) -> &'static str {
        match self {
            WireVariant::Binary => ">ping",
            WireVariant::Textual => "Pping",
        }
    }

    fn classify(&self, opcode: char) -> Option<Inbound> {
        match (self, opcode) {
            (WireVariant::Textual, 'a') | (WireVariant::Binary, '<') => Some(Inbound::KeepAlive),
            (WireVariant::Textual, 'E') | (WireVariant::Binary, 'E' | 'e') => Some(Inbound::Error),
            (WireVariant::Textual, 'I') | (WireVariant::Binary, 'I' | 'i') => Some(Inbound::Info),
            (_, 'h') => Some(Inbound::Heap),
            (_, 'p') => Some(Inbound::Pong),
            _ => None,
        }
    }
}

impl FromStr for WireVariant {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(WireVariant::Binary),
            "textual" | "text" => Ok(WireVariant::Textual),
            _ => Err(ProtocolError::UnknownWireVariant(s.to_string())),
        }
    }
}

impl fmt::Display for WireVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireVariant::Binary => f.write_str("binary"),
            WireVariant::Textual => f.write_str("textual"),
        }
    }
}

/// Inbound opcode classes shared by both tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inbound {
    KeepAlive,
    Error,
    Info,
    Heap,
    Pong,
}

/// Stateless encoder/decoder for one wire variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    variant: WireVariant,
    heartbeat_token: String,
}

impl Codec {
    pub fn new(variant: WireVariant) -> Self {
        Codec {
            variant,
            heartbeat_token: variant.default_heartbeat_token().to_string(),
        }
    }

    /// Replace the heartbeat sentinel for deployments that use their own
    pub fn with_heartbeat_token(mut self, token: impl Into<String>) -> Self {
        self.heartbeat_token = token.into();
        self
    }

    pub fn variant(&self) -> WireVariant {
        self.variant
    }

    pub fn heartbeat_token(&self) -> &str {
        &self.heartbeat_token
    }

    /// Encode a command into the frames that carry it
    ///
    /// Panel geometry produces two frames (rows, then columns); every other
    /// command is exactly one frame.
    pub fn encode(&self, command: &Command) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(1);
        match command {
            Command::Heartbeat => frames.push(Frame::text(self.heartbeat_token.as_str())),
            Command::Ping => frames.push(Frame::text(self.variant.ping())),
            Command::QueryHeap => frames.push(Frame::text("heap")),
            Command::ResetDevice => frames.push(Frame::text("wr")),
            Command::SetSingleColor(color) => {
                frames.push(self.color_frame(TAG_SINGLE_COLOR, 's', std::slice::from_ref(color)))
            }
            Command::SetGradient { left, right } => {
                frames.push(self.color_frame(TAG_GRADIENT, 'g', &[*left, *right]))
            }
            Command::SetIndividualPixels(pixels) => {
                frames.push(self.color_frame(TAG_PIXELS, 'm', pixels))
            }
            Command::SetPanelGeometry { rows, columns } => {
                frames.push(Frame::Text(format!("pr{rows}")));
                frames.push(Frame::Text(format!("pc{columns}")));
            }
            Command::SetOutputMode { gamma_correction } => {
                frames.push(Frame::text(if *gamma_correction { "cy" } else { "cn" }))
            }
            Command::SetColorMode { all_same } => {
                frames.push(Frame::text(if *all_same { "sa" } else { "sc" }))
            }
            Command::SetGradientOrientation(orientation) => {
                frames.push(Frame::Text(format!("o{}", orientation.as_flag())))
            }
        }
        frames
    }

    fn color_frame(&self, tag: u8, opcode: char, colors: &[Rgb]) -> Frame {
        match self.variant {
            WireVariant::Binary => {
                let mut bytes = Vec::with_capacity(1 + colors.len() * 3);
                bytes.push(tag);
                for color in colors {
                    bytes.extend_from_slice(&color.to_bytes());
                }
                Frame::Binary(bytes)
            }
            WireVariant::Textual => {
                let mut text = String::with_capacity(1 + colors.len() * 6);
                text.push(opcode);
                for color in colors {
                    text.push_str(&color.to_hex());
                }
                Frame::Text(text)
            }
        }
    }

    /// Decode one inbound frame into a status message
    ///
    /// Never fails: unknown opcodes become [`StatusMessage::Unrecognized`]
    /// carrying the whole frame, and non-UTF-8 bytes are replaced lossily.
    pub fn decode(&self, bytes: &[u8]) -> StatusMessage {
        let raw = String::from_utf8_lossy(bytes);
        let mut chars = raw.chars();
        let Some(opcode) = chars.next() else {
            return StatusMessage::Unrecognized(String::new());
        };

        let rest = chars.as_str();
        let payload = if rest.is_empty() {
            NO_DATA.to_string()
        } else {
            rest.to_string()
        };

        match self.variant.classify(opcode) {
            Some(Inbound::KeepAlive) => StatusMessage::KeepAliveAck,
            Some(Inbound::Error) => StatusMessage::Error(payload),
            Some(Inbound::Info) => StatusMessage::Info(payload),
            Some(Inbound::Heap) => StatusMessage::HeapSize(payload),
            Some(Inbound::Pong) => StatusMessage::Pong,
            None => StatusMessage::Unrecognized(raw.to_string()),
        }
    }

    /// Device-side inverse of [`Codec::encode`] for single-frame commands
    ///
    /// Returns `None` for frames this variant would never produce, including
    /// each half of a panel geometry pair.
    pub fn decode_command(&self, frame: &Frame) -> Option<Command> {
        match frame {
            Frame::Binary(bytes) => self.decode_binary_command(bytes),
            Frame::Text(text) => self.decode_text_command(text),
        }
    }

    fn decode_binary_command(&self, bytes: &[u8]) -> Option<Command> {
        if self.variant != WireVariant::Binary {
            return None;
        }
        let (&tag, body) = bytes.split_first()?;
        if body.is_empty() || body.len() % 3 != 0 {
            return None;
        }
        let colors: Vec<Rgb> = body
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect();

        match (tag, colors.as_slice()) {
            (TAG_SINGLE_COLOR, [color]) => Some(Command::SetSingleColor(*color)),
            (TAG_GRADIENT, [left, right]) => Some(Command::SetGradient {
                left: *left,
                right: *right,
            }),
            (TAG_PIXELS, _) => Some(Command::SetIndividualPixels(colors)),
            _ => None,
        }
    }

    fn decode_text_command(&self, text: &str) -> Option<Command> {
        if text == self.heartbeat_token {
            return Some(Command::Heartbeat);
        }
        if text == self.variant.ping() {
            return Some(Command::Ping);
        }

        match text {
            "heap" => return Some(Command::QueryHeap),
            "wr" => return Some(Command::ResetDevice),
            "cy" | "cn" => {
                return Some(Command::SetOutputMode {
                    gamma_correction: text == "cy",
                });
            }
            "sa" | "sc" => {
                return Some(Command::SetColorMode {
                    all_same: text == "sa",
                });
            }
            _ => {}
        }

        if let Some(flag) = text.strip_prefix('o') {
            let mut flags = flag.chars();
            return match (flags.next(), flags.next()) {
                (Some(flag), None) => {
                    GradientOrientation::from_flag(flag).map(Command::SetGradientOrientation)
                }
                _ => None,
            };
        }

        if self.variant != WireVariant::Textual {
            return None;
        }

        let mut chars = text.chars();
        let opcode = chars.next()?;
        let colors = parse_hex_colors(chars.as_str())?;
        match (opcode, colors.as_slice()) {
            ('s', [color]) => Some(Command::SetSingleColor(*color)),
            ('g', [left, right]) => Some(Command::SetGradient {
                left: *left,
                right: *right,
            }),
            ('m', _) => Some(Command::SetIndividualPixels(colors)),
            _ => None,
        }
    }
}

/// Split a run of `RRGGBB` groups into colors
fn parse_hex_colors(hex: &str) -> Option<Vec<Rgb>> {
    if hex.is_empty() || !hex.is_ascii() || hex.len() % 6 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(6)
        .map(|at| Rgb::from_hex(&hex[at..at + 6]).ok())
        .collect()
}
