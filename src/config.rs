//! Configuration loading and validation

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::info;

use crate::data_aquisition::{
    connection::{Connection, ConnectionError, Credentials, DEFAULT_SNMP_PORT, SnmpVersion},
    core::{SnmpTransport, TransportError},
    net_snmp::NetSnmpTransport,
    snmp::{DEFAULT_MAX_REPETITIONS, DEFAULT_TIMEOUT, Snmp2Transport},
};
use crate::network::switch::Switch;
use crate::topology::{
    discovery::{DEFAULT_CONCURRENCY, DEFAULT_SKIP_VLANS},
    policy::{IF_TYPE_ETHERNET, IF_TYPE_FIBRE_CHANNEL, InterfacePolicy, TypeSelection},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Agent {agent}: {source}")]
    Agent {
        agent: String,
        #[source]
        source: ConnectionError,
    },
    #[error("Agent {agent}: missing {field}")]
    MissingField { agent: String, field: &'static str },
    #[error("No [[switch]] configured")]
    NoSwitches,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default, rename = "switch")]
    pub switches: Vec<AgentConfig>,
    /// Agents whose ARP tables feed the hostname map; the switches themselves when empty
    #[serde(default, rename = "arp_source")]
    pub arp_sources: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Interface types that may become ports, a list or "*"
    #[serde(default = "default_allowed_types")]
    pub allowed_types: TypeSelection,
    /// Interface types never kept, even if allowed
    #[serde(default)]
    pub filtered_types: BTreeSet<i64>,
    #[serde(default = "default_true")]
    pub skip_down_ports: bool,
    /// VLANs whose forwarding tables are not walked
    #[serde(default = "default_skip_vlans")]
    pub skip_vlans: Vec<u16>,
    #[serde(default)]
    pub reverse_dns: bool,
    /// Switches discovered at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            allowed_types: default_allowed_types(),
            filtered_types: BTreeSet::new(),
            skip_down_ports: true,
            skip_vlans: default_skip_vlans(),
            reverse_dns: false,
            concurrency: default_concurrency(),
        }
    }
}

impl DiscoveryConfig {
    pub fn policy(&self) -> InterfacePolicy {
        InterfacePolicy {
            allowed: self.allowed_types.clone(),
            filtered: self.filtered_types.clone(),
            require_oper_up: self.skip_down_ports,
        }
    }
}

fn default_allowed_types() -> TypeSelection {
    TypeSelection::only([IF_TYPE_ETHERNET, IF_TYPE_FIBRE_CHANNEL])
}

fn default_skip_vlans() -> Vec<u16> {
    DEFAULT_SKIP_VLANS.to_vec()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Native SNMP through the `snmp2` crate
    #[default]
    Snmp2,
    /// The `snmpget`/`snmpwalk` command line tools
    NetSnmp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    /// Per-request timeout, e.g. "2s" or "500ms"
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// GETBULK batch size (snmp2 only)
    #[serde(default = "default_max_repetitions")]
    pub max_repetitions: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            timeout: default_timeout(),
            max_repetitions: default_max_repetitions(),
        }
    }
}

impl TransportConfig {
    /// Build the configured transport. The command line tools are checked for on the way.
    pub async fn build(&self) -> Result<Arc<dyn SnmpTransport>, TransportError> {
        match self.kind {
            TransportKind::Snmp2 => Ok(Arc::new(Snmp2Transport::new(self.timeout, self.max_repetitions))),
            TransportKind::NetSnmp => {
                NetSnmpTransport::check_available().await?;
                Ok(Arc::new(NetSnmpTransport::new(self.timeout)))
            }
        }
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_max_repetitions() -> u32 {
    DEFAULT_MAX_REPETITIONS
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

/// One SNMP agent: a switch to discover or an ARP source.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Display name; the host when omitted
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_version")]
    pub version: String,
    pub community: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_SNMP_PORT
}

fn default_version() -> String {
    "2c".to_string()
}

impl AgentConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.host)
    }

    pub fn to_connection(&self) -> Result<Connection, ConfigError> {
        let agent_error = |source| ConfigError::Agent {
            agent: self.name().to_string(),
            source,
        };
        let missing = |field| ConfigError::MissingField {
            agent: self.name().to_string(),
            field,
        };

        let version: SnmpVersion = self.version.parse().map_err(agent_error)?;
        let credentials = if version.is_community_based() {
            Credentials::Community(self.community.clone().ok_or_else(|| missing("community"))?)
        } else {
            Credentials::User {
                username: self.username.clone().ok_or_else(|| missing("username"))?,
                password: self.password.clone().ok_or_else(|| missing("password"))?,
            }
        };
        Connection::new(self.host.clone(), self.port, version, credentials).map_err(agent_error)
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Empty switches to discover, in configuration order.
    pub fn switches(&self) -> Result<Vec<Switch>, ConfigError> {
        if self.switches.is_empty() {
            return Err(ConfigError::NoSwitches);
        }
        self.switches
            .iter()
            .map(|agent| Ok(Switch::new(agent.name(), agent.to_connection()?)))
            .collect()
    }

    /// Connections whose ARP tables are read.
    pub fn arp_connections(&self) -> Result<Vec<Connection>, ConfigError> {
        let agents = if self.arp_sources.is_empty() {
            &self.switches
        } else {
            &self.arp_sources
        };
        agents.iter().map(AgentConfig::to_connection).collect()
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = Config::from_toml(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        switches = config.switches.len(),
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[discovery]
allowed_types = "*"
filtered_types = [24, 161]
skip_down_ports = false
reverse_dns = true

[transport]
kind = "net-snmp"
timeout = "500ms"

[[switch]]
name = "core"
host = "10.0.0.1"
community = "private"

[[switch]]
host = "10.0.0.2"
port = 1161
version = "3"
username = "monitor"
password = "secret123"

[[arp_source]]
name = "router"
host = "10.0.0.254"
version = "1"
community = "public"
"#;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(EXAMPLE).unwrap();

        let policy = config.discovery.policy();
        assert_eq!(policy.allowed, TypeSelection::any());
        assert_eq!(policy.filtered, BTreeSet::from([24, 161]));
        assert!(!policy.require_oper_up);
        assert!(config.discovery.reverse_dns);
        assert_eq!(config.discovery.skip_vlans, vec![1002, 1003, 1004, 1005]);

        assert_eq!(config.transport.kind, TransportKind::NetSnmp);
        assert_eq!(config.transport.timeout, Duration::from_millis(500));
        assert_eq!(config.transport.max_repetitions, DEFAULT_MAX_REPETITIONS);

        let switches = config.switches().unwrap();
        assert_eq!(switches[0].name, "core");
        assert_eq!(switches[0].connection, Connection::v2c("10.0.0.1", "private"));
        assert_eq!(switches[1].name, "10.0.0.2");
        assert_eq!(switches[1].connection.version(), SnmpVersion::V3);
        assert_eq!(switches[1].connection.agent(), "10.0.0.2:1161");

        let arp = config.arp_connections().unwrap();
        assert_eq!(arp.len(), 1);
        assert_eq!(arp[0].version(), SnmpVersion::V1);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("[[switch]]\nhost = \"sw1\"\ncommunity = \"public\"\n").unwrap();
        assert_eq!(config.discovery.policy(), InterfacePolicy::default());
        assert_eq!(config.discovery.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.transport.kind, TransportKind::Snmp2);
        assert_eq!(config.transport.timeout, DEFAULT_TIMEOUT);
        // ARP tables come from the switches when no source is listed
        assert_eq!(config.arp_connections().unwrap(), vec![Connection::v2c("sw1", "public")]);
    }

    #[test]
    fn test_agent_errors() {
        let config = Config::from_toml("[[switch]]\nhost = \"sw1\"\nversion = \"3\"\nusername = \"u\"\n").unwrap();
        assert!(matches!(
            config.switches(),
            Err(ConfigError::MissingField { field: "password", .. })
        ));

        let config = Config::from_toml("[[switch]]\nhost = \"sw1\"\nversion = \"4\"\ncommunity = \"c\"\n").unwrap();
        assert!(matches!(
            config.switches(),
            Err(ConfigError::Agent {
                source: ConnectionError::UnsupportedVersion(_),
                ..
            })
        ));

        assert!(matches!(Config::from_toml("").unwrap().switches(), Err(ConfigError::NoSwitches)));
    }

    #[test]
    fn test_bad_timeout() {
        assert!(Config::from_toml("[transport]\ntimeout = \"soon\"\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/switchmap.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
