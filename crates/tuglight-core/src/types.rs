//! Command and status types exchanged with the LED controller
//!
//! Commands flow client -> device and carry no identifier; the device never
//! acknowledges them individually. Status messages flow device -> client and
//! are decoded from exactly one frame each.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolError;

/// Payload reported for frames that carry only an opcode
pub const NO_DATA: &str = "[no data received]";

/// An RGB color with 8-bit components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Parse a 6-hex-digit `RRGGBB` string (no leading `#`)
    pub fn from_hex(hex: &str) -> Result<Self, ProtocolError> {
        let bytes = hex.as_bytes();
        if bytes.len() != 6 || !bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(ProtocolError::InvalidColor(hex.to_string()));
        }

        let component = |at: usize| {
            u8::from_str_radix(&hex[at..at + 2], 16)
                .map_err(|_| ProtocolError::InvalidColor(hex.to_string()))
        };

        Ok(Rgb {
            r: component(0)?,
            g: component(2)?,
            b: component(4)?,
        })
    }

    /// Render as uppercase `RRGGBB`
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Rgb {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::from_hex(s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Direction in which the device spreads a gradient across the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientOrientation {
    Horizontal,
    Vertical,
    /// Follow the physical wiring order of the strip
    Consecutive,
}

impl GradientOrientation {
    pub fn as_flag(&self) -> char {
        match self {
            GradientOrientation::Horizontal => 'h',
            GradientOrientation::Vertical => 'v',
            GradientOrientation::Consecutive => 'c',
        }
    }

    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'h' => Some(GradientOrientation::Horizontal),
            'v' => Some(GradientOrientation::Vertical),
            'c' => Some(GradientOrientation::Consecutive),
            _ => None,
        }
    }
}

/// An outbound command for the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetSingleColor(Rgb),
    SetGradient { left: Rgb, right: Rgb },
    SetIndividualPixels(Vec<Rgb>),
    /// Sent on the wire as two frames, rows first
    SetPanelGeometry { rows: u16, columns: u16 },
    SetOutputMode { gamma_correction: bool },
    /// `all_same` lights every pixel with the single color instead of one
    SetColorMode { all_same: bool },
    SetGradientOrientation(GradientOrientation),
    QueryHeap,
    Ping,
    ResetDevice,
    Heartbeat,
}

impl Command {
    /// Short stable name used in log fields
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetSingleColor(_) => "set_single_color",
            Command::SetGradient { .. } => "set_gradient",
            Command::SetIndividualPixels(_) => "set_individual_pixels",
            Command::SetPanelGeometry { .. } => "set_panel_geometry",
            Command::SetOutputMode { .. } => "set_output_mode",
            Command::SetColorMode { .. } => "set_color_mode",
            Command::SetGradientOrientation(_) => "set_gradient_orientation",
            Command::QueryHeap => "query_heap",
            Command::Ping => "ping",
            Command::ResetDevice => "reset_device",
            Command::Heartbeat => "heartbeat",
        }
    }
}

/// An inbound status message decoded from one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StatusMessage {
    Error(String),
    Info(String),
    /// Free heap in bytes, as the decimal string the device sent
    HeapSize(String),
    Pong,
    KeepAliveAck,
    /// Unknown opcode; carries the entire raw frame
    Unrecognized(String),
}

impl StatusMessage {
    /// The frame minus its opcode, or [`NO_DATA`] for opcode-only frames
    pub fn payload(&self) -> &str {
        match self {
            StatusMessage::Error(text)
            | StatusMessage::Info(text)
            | StatusMessage::HeapSize(text) => text,
            StatusMessage::Pong | StatusMessage::KeepAliveAck => NO_DATA,
            StatusMessage::Unrecognized(raw) => {
                let mut chars = raw.chars();
                chars.next();
                match chars.as_str() {
                    "" => NO_DATA,
                    rest => rest,
                }
            }
        }
    }

    pub fn heap_bytes(&self) -> Option<u32> {
        match self {
            StatusMessage::HeapSize(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        matches!(self, StatusMessage::KeepAliveAck)
    }

    /// Render for a user-visible message log
    ///
    /// Keep-alive acks return `None`; they prove liveness but are noise to a
    /// human reader.
    pub fn log_line(&self) -> Option<String> {
        match self {
            StatusMessage::KeepAliveAck => None,
            StatusMessage::Error(text) => Some(format!("Error! --> {text}")),
            StatusMessage::Info(text) => Some(format!("Info --> {text}")),
            StatusMessage::HeapSize(text) => Some(format!("Free heap size: {text}")),
            StatusMessage::Pong => Some("pong".to_string()),
            StatusMessage::Unrecognized(raw) => Some(raw.clone()),
        }
    }
}

/// One discrete WebSocket message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        Frame::Text(text.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
