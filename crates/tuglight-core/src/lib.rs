//! tuglight-core: Shared types for the tuglight LED controller client
//!
//! This crate provides the command and status types, the wire codec for both
//! firmware wire variants, and device endpoint resolution. It has no I/O.
//!
//! ## Modules
//!
//! - [`protocol`] - Wire codec and the [`WireVariant`] selector
//! - [`types`] - Commands, status messages, colors, and frames
//! - [`endpoint`] - Device endpoint resolution

pub mod endpoint;
pub mod protocol;
pub mod types;

pub use endpoint::{CONTROL_PORT, Endpoint, EndpointError, Scheme};
pub use protocol::{Codec, ProtocolError, WireVariant};
pub use types::{Command, Frame, GradientOrientation, NO_DATA, Rgb, StatusMessage};
