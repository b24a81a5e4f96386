use std::time::Duration;

use clap::Parser;

use tuglight_core::{Endpoint, EndpointError, WireVariant};

use tuglight::SessionConfig;

/// tuglight: console client for a WebSocket LED panel controller
#[derive(Parser, Debug)]
#[command(name = "tuglight")]
#[command(about = "Drive an LED panel controller over WebSocket", long_about = None)]
pub struct Cli {
    /// Explicit device endpoint, e.g. ws://192.168.1.20:81 (wins over --page-host)
    #[arg(long)]
    pub ws1: Option<String>,

    /// Host the control page was served from; the control port 81 is used
    #[arg(long)]
    pub page_host: Option<String>,

    /// Wire convention of the device firmware (binary or textual)
    #[arg(long)]
    pub wire: WireVariant,

    /// Milliseconds between heartbeats
    #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_ms: u64,

    /// Override the heartbeat sentinel sent to the device
    #[arg(long)]
    pub heartbeat_token: Option<String>,

    /// Print events as JSON lines instead of a message log
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Cli {
    /// Parse CLI arguments from the environment
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        Endpoint::resolve(self.ws1.as_deref(), self.page_host.as_deref())
    }

    pub fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::new(self.wire)
            .with_heartbeat_interval(Duration::from_millis(self.heartbeat_ms));
        match &self.heartbeat_token {
            Some(token) => config.with_heartbeat_token(token.clone()),
            None => config,
        }
    }
}
