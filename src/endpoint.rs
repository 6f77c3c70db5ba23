use crate::prelude::*;

use std::fmt;
use std::str::FromStr;

pub const TCP_PREFIX: &str = "tcp://";
pub const MODBUS_PREFIX: &str = "modbus://";

/// Which codec family handles a device.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProtocolFamily {
    Voltronic,
    Modbus,
}

/// Where a device lives. The connection-string prefix fully determines the
/// transport and, through it, the protocol family.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Endpoint {
    Serial { path: String },
    Tcp { host: String, port: u16 },
    Modbus { host: String, port: u16 },
}

impl Endpoint {
    pub fn family(&self) -> ProtocolFamily {
        match self {
            Self::Serial { .. } | Self::Tcp { .. } => ProtocolFamily::Voltronic,
            Self::Modbus { .. } => ProtocolFamily::Modbus,
        }
    }

    fn host_port(input: &str) -> Result<(String, u16)> {
        let url = url::Url::parse(input)
            .map_err(|e| file_error!("invalid endpoint {}: {}", input, e))?;

        // IPv6 literals are kept without their brackets so they can be
        // passed straight to the socket layer
        let host = match url.host() {
            Some(url::Host::Ipv6(addr)) => addr.to_string(),
            Some(url::Host::Ipv4(addr)) => addr.to_string(),
            Some(url::Host::Domain(d)) if !d.is_empty() => d.to_string(),
            _ => bail!("endpoint {} has no host", input),
        };
        let port = match url.port() {
            Some(p) if p > 0 => p,
            _ => bail!("endpoint {} has no port", input),
        };

        Ok((host, port))
    }
}

impl FromStr for Endpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            bail!("empty endpoint");
        }

        if s.starts_with(TCP_PREFIX) {
            let (host, port) = Self::host_port(s)?;
            Ok(Self::Tcp { host, port })
        } else if s.starts_with(MODBUS_PREFIX) {
            let (host, port) = Self::host_port(s)?;
            Ok(Self::Modbus { host, port })
        } else {
            Ok(Self::Serial {
                path: s.to_string(),
            })
        }
    }
}

struct HostPort<'a>(&'a str, u16);

impl fmt::Display for HostPort<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.contains(':') {
            write!(f, "[{}]:{}", self.0, self.1)
        } else {
            write!(f, "{}:{}", self.0, self.1)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path } => write!(f, "{}", path),
            Self::Tcp { host, port } => write!(f, "{}{}", TCP_PREFIX, HostPort(host, *port)),
            Self::Modbus { host, port } => write!(f, "{}{}", MODBUS_PREFIX, HostPort(host, *port)),
        }
    }
}
