//! Device endpoint resolution
//!
//! The controller listens on a fixed control port. A client resolves the
//! endpoint once, before the session starts:
//! 1. an explicit `ws1` override,
//! 2. else the host the control page was served from, on the control port,
//! 3. else the loopback default.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

/// WebSocket port the controller firmware listens on
pub const CONTROL_PORT: u16 = 81;

/// Query parameter carrying an explicit endpoint override
pub const OVERRIDE_PARAM: &str = "ws1";

/// Host used when nothing else is known (page opened from a local file)
pub const LOOPBACK_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint {input:?}: {reason}")]
    Invalid { input: String, reason: String },

    #[error("unsupported scheme {0:?}: expected ws or wss")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

/// Address of one device, immutable for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// `ws://127.0.0.1:81`
    pub fn loopback() -> Self {
        Endpoint::new(Scheme::Ws, LOOPBACK_HOST, CONTROL_PORT)
    }

    /// Resolve the endpoint from an optional override and the page host
    ///
    /// The page host may carry a port (`192.168.1.20:8080`); it is replaced by
    /// [`CONTROL_PORT`]. Empty strings count as absent.
    pub fn resolve(
        override_url: Option<&str>,
        page_host: Option<&str>,
    ) -> Result<Endpoint, EndpointError> {
        if let Some(raw) = override_url.map(str::trim).filter(|s| !s.is_empty()) {
            return Endpoint::parse(raw);
        }

        let host = page_host
            .map(str::trim)
            .and_then(|h| h.split(':').next())
            .filter(|h| !h.is_empty());

        Ok(match host {
            Some(host) => Endpoint::new(Scheme::Ws, host, CONTROL_PORT),
            None => Endpoint::loopback(),
        })
    }

    /// Resolve from a page query string such as `?ws1=ws%3A%2F%2F10.0.0.5%3A81`
    pub fn from_query(query: &str, page_host: Option<&str>) -> Result<Endpoint, EndpointError> {
        let query = query.trim_start_matches('?');
        let override_url = query.split('&').find_map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (name == OVERRIDE_PARAM)
                .then(|| percent_decode_str(value).decode_utf8_lossy().into_owned())
        });
        Endpoint::resolve(override_url.as_deref(), page_host)
    }

    /// Parse an explicit endpoint; a bare `host[:port]` is taken as `ws://`
    ///
    /// A URL without a port gets [`CONTROL_PORT`], not the scheme default:
    /// `ws://panel` resolves to `ws://panel:81`. Spell the port out
    /// (`ws://panel:80`) to reach a device behind the standard port.
    pub fn parse(input: &str) -> Result<Endpoint, EndpointError> {
        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("ws://{input}")
        };

        let url = Url::parse(&candidate).map_err(|e| EndpointError::Invalid {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match url.scheme() {
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| EndpointError::Invalid {
                input: input.to_string(),
                reason: "missing host".to_string(),
            })?;

        // Url reports no port when it equals the scheme default (80/443)
        let port = match url.port() {
            Some(port) => port,
            None if has_explicit_port(&candidate) => {
                url.port_or_known_default().unwrap_or(CONTROL_PORT)
            }
            None => CONTROL_PORT,
        };

        Ok(Endpoint::new(scheme, host, port))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Full URL string passed to the WebSocket client
    pub fn url(&self) -> String {
        self.to_string()
    }
}

/// Whether the authority part of `url` spells out a port
fn has_explicit_port(url: &str) -> bool {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let after_host = match host_port.rfind(']') {
        Some(at) => &host_port[at + 1..],
        None => host_port,
    };
    after_host
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}
