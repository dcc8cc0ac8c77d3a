use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BrokerUriError {
    #[error("Unsupported broker scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Broker URI has no host: {0}")]
    MissingHost(String),

    #[error("Invalid broker port: {0}")]
    InvalidPort(String),
}

/// Plain-TCP MQTT broker address parsed from `mqtt://host[:port]`.
///
/// `tcp://` and bare `host[:port]` are accepted as well; TLS schemes are not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerUri {
    host: String,
    port: u16,
}

impl BrokerUri {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form used for socket connections.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for BrokerUri {
    type Err = BrokerUriError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let uri = uri.trim();
        let rest = match uri.split_once("://") {
            Some(("mqtt" | "tcp", rest)) => rest,
            Some((scheme, _)) => return Err(BrokerUriError::UnsupportedScheme(scheme.to_string())),
            None => uri,
        };
        let authority = rest.trim_end_matches('/');
        if authority.contains('/') {
            return Err(BrokerUriError::MissingHost(uri.to_string()));
        }

        let (host, port) = match authority.strip_prefix('[') {
            Some(bracketed) => {
                let (host, tail) = bracketed
                    .split_once(']')
                    .ok_or_else(|| BrokerUriError::MissingHost(uri.to_string()))?;
                match tail.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None if tail.is_empty() => (host, None),
                    None => return Err(BrokerUriError::InvalidPort(tail.to_string())),
                }
            }
            None => match authority.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            },
        };

        if host.is_empty() {
            return Err(BrokerUriError::MissingHost(uri.to_string()));
        }

        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| BrokerUriError::InvalidPort(port.to_string()))?,
            None => DEFAULT_MQTT_PORT,
        };

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for BrokerUri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mqtt://{}", self.authority())
    }
}
