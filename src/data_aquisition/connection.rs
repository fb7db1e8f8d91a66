use std::{fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_SNMP_PORT: u16 = 161;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Unsupported SNMP version: {0}")]
    UnsupportedVersion(String),
    #[error("SNMP {version} requires {expected}")]
    CredentialMismatch {
        version: SnmpVersion,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl SnmpVersion {
    /// Value for the net-snmp `-v` flag.
    pub fn as_arg(&self) -> &'static str {
        match self {
            SnmpVersion::V1 => "1",
            SnmpVersion::V2c => "2c",
            SnmpVersion::V3 => "3",
        }
    }

    pub fn is_community_based(&self) -> bool {
        matches!(self, SnmpVersion::V1 | SnmpVersion::V2c)
    }
}

impl FromStr for SnmpVersion {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "v1" => Ok(SnmpVersion::V1),
            "2" | "2c" | "v2c" => Ok(SnmpVersion::V2c),
            "3" | "v3" => Ok(SnmpVersion::V3),
            other => Err(ConnectionError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl Display for SnmpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_arg())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credentials {
    Community(String),
    User { username: String, password: String },
}

/// Where and how to reach one SNMP agent.
///
/// Immutable once built; VLAN-scoped variants are derived with [`Connection::for_vlan`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    host: String,
    port: u16,
    version: SnmpVersion,
    credentials: Credentials,
}

impl Connection {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        version: SnmpVersion,
        credentials: Credentials,
    ) -> Result<Self, ConnectionError> {
        match (&version, &credentials) {
            (SnmpVersion::V1 | SnmpVersion::V2c, Credentials::User { .. }) => {
                return Err(ConnectionError::CredentialMismatch {
                    version,
                    expected: "a community string",
                });
            }
            (SnmpVersion::V3, Credentials::Community(_)) => {
                return Err(ConnectionError::CredentialMismatch {
                    version,
                    expected: "a username and password",
                });
            }
            _ => {}
        }
        Ok(Self {
            host: host.into(),
            port,
            version,
            credentials,
        })
    }

    /// SNMPv2c on the default port.
    pub fn v2c(host: impl Into<String>, community: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SNMP_PORT,
            version: SnmpVersion::V2c,
            credentials: Credentials::Community(community.into()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn version(&self) -> SnmpVersion {
        self.version
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn community(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::Community(c) => Some(c),
            Credentials::User { .. } => None,
        }
    }

    /// `host:port`, as accepted by both net-snmp and socket address resolution.
    pub fn agent(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection for the forwarding context of `vlan` (`community@vlan`).
    ///
    /// `None` is the default context. SNMPv3 has no community to suffix, so the connection is
    /// returned unchanged and the agent answers from its default context.
    pub fn for_vlan(&self, vlan: Option<u16>) -> Connection {
        let Some(vlan) = vlan else {
            return self.clone();
        };
        match &self.credentials {
            Credentials::Community(community) => Connection {
                credentials: Credentials::Community(format!("{}@{}", community, vlan)),
                ..self.clone()
            },
            Credentials::User { .. } => {
                debug!(agent = %self.agent(), vlan, "VLAN context not applied to SNMPv3 connection");
                self.clone()
            }
        }
    }
}

impl Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.agent(), self.version)
    }
}
