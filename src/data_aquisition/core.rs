use async_trait::async_trait;
use thiserror::Error;

use crate::data_aquisition::connection::{Connection, ConnectionError};
use crate::network::mac::MacAddress;

/// A decoded SNMP value, independent of how it was retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    /// No such object / no such instance, or a payload that could not be classified
    Absent,
    Integer(i64),
    Address(MacAddress),
    Text(String),
}

impl SnmpValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, SnmpValue::Absent)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<MacAddress> {
        match self {
            SnmpValue::Address(mac) => Some(*mac),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SnmpValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Any present value rendered as a string (interface names sometimes come back as addresses).
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            SnmpValue::Absent => None,
            SnmpValue::Integer(i) => Some(i.to_string()),
            SnmpValue::Address(mac) => Some(mac.format_hex()),
            SnmpValue::Text(s) => Some(s.clone()),
        }
    }
}

/// One entry of a walked subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    /// Numeric dotted OID without a leading dot
    pub oid: String,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: impl Into<String>, value: SnmpValue) -> Self {
        Self {
            oid: normalize_oid(&oid.into()),
            value,
        }
    }

    /// The OID components after `prefix`, e.g. the row index of a table column.
    pub fn index_suffix(&self, prefix: &str) -> Option<Vec<u64>> {
        let prefix = normalize_oid(prefix);
        let rest = self.oid.strip_prefix(&prefix)?.strip_prefix('.')?;
        parse_oid(rest)
    }

    /// Last component of the OID.
    pub fn last_component(&self) -> Option<u64> {
        self.oid.rsplit('.').next()?.parse().ok()
    }
}

pub fn normalize_oid(oid: &str) -> String {
    oid.trim().trim_start_matches('.').to_string()
}

pub fn parse_oid(oid: &str) -> Option<Vec<u64>> {
    let oid = oid.trim().trim_start_matches('.');
    if oid.is_empty() {
        return None;
    }
    oid.split('.').map(|part| part.parse().ok()).collect()
}

/// True if `oid` is `prefix` itself or lies below it.
pub fn oid_within(oid: &str, prefix: &str) -> bool {
    let oid = oid.trim_start_matches('.');
    let prefix = prefix.trim_start_matches('.');
    oid == prefix
        || oid
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid OID: {0}")]
    InvalidOid(String),
    #[error("Request to {agent} timed out")]
    Timeout { agent: String },
    #[error("I/O error talking to {agent}: {source}")]
    Io {
        agent: String,
        #[source]
        source: std::io::Error,
    },
    #[error("SNMP error from {agent}: {message}")]
    Snmp { agent: String, message: String },
    #[error("{tool} exited with {status}: {stderr}")]
    Command {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("{0} is not installed or not on PATH")]
    ToolMissing(String),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Request/response access to an SNMP agent.
///
/// Implementations do not retry; a failure is reported once to the caller.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// Fetch a single value. A missing object or instance is `SnmpValue::Absent`, not an error.
    async fn fetch(&self, connection: &Connection, oid: &str) -> Result<SnmpValue, TransportError>;

    /// Enumerate a subtree in agent order. Absent values are never returned.
    async fn walk(&self, connection: &Connection, prefix: &str) -> Result<Vec<VarBind>, TransportError>;

    /// Drop whatever is held open for `connection`. A later request opens it again.
    async fn release(&self, _connection: &Connection) {}
}
