use std::{io::ErrorKind, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::data_aquisition::{
    connection::{Connection, Credentials},
    core::{SnmpTransport, SnmpValue, TransportError, VarBind, normalize_oid},
};
use crate::parsers::dump::{decode_dump, decode_single};

const SNMPGET: &str = "snmpget";
const SNMPWALK: &str = "snmpwalk";

/// SNMP transport that drives the net-snmp command line tools.
///
/// Output is requested with numeric OIDs (`-On`) and without units (`-OU`) and decoded with the
/// textual value decoder.
pub struct NetSnmpTransport {
    timeout: Duration,
}

impl Default for NetSnmpTransport {
    fn default() -> Self {
        Self::new(crate::data_aquisition::snmp::DEFAULT_TIMEOUT)
    }
}

impl NetSnmpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Verifies that `snmpget` and `snmpwalk` can be executed.
    pub async fn check_available() -> Result<(), TransportError> {
        for tool in [SNMPGET, SNMPWALK] {
            match Command::new(tool).arg("-V").output().await {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(TransportError::ToolMissing(tool.to_string()));
                }
                Err(source) => {
                    return Err(TransportError::Io {
                        agent: tool.to_string(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Arguments shared by `snmpget` and `snmpwalk`, up to and including the agent.
    pub fn base_args(&self, connection: &Connection) -> Vec<String> {
        let mut args = vec![
            "-On".to_string(),
            "-OU".to_string(),
            "-t".to_string(),
            self.timeout.as_secs().max(1).to_string(),
            "-r".to_string(),
            "0".to_string(),
            "-v".to_string(),
            connection.version().as_arg().to_string(),
        ];
        match connection.credentials() {
            Credentials::Community(community) => {
                args.extend(["-c".to_string(), community.clone()]);
            }
            Credentials::User { username, password } => {
                args.extend(
                    ["-l", "authNoPriv", "-a", "MD5", "-u", username.as_str(), "-A", password.as_str()]
                        .into_iter()
                        .map(str::to_string),
                );
            }
        }
        args.push(connection.agent());
        args
    }

    /// Run `tool` against `oid`. `Ok(None)` means the agent reported the object missing.
    async fn run(&self, tool: &str, connection: &Connection, oid: &str) -> Result<Option<String>, TransportError> {
        let mut args = self.base_args(connection);
        args.push(normalize_oid(oid));
        trace!(tool, agent = %connection.agent(), oid, "Running net-snmp tool");

        let output = Command::new(tool)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => TransportError::ToolMissing(tool.to_string()),
                _ => TransportError::Io {
                    agent: connection.agent(),
                    source: e,
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return match exit_failure(tool, connection, output.status.to_string(), stderr) {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

/// Error for a tool that exited unsuccessfully, or `None` when the agent answered noSuchName.
fn exit_failure(tool: &str, connection: &Connection, status: String, stderr: String) -> Option<TransportError> {
    if is_missing_object(&stderr) {
        return None;
    }
    if stderr.starts_with("Timeout") {
        return Some(TransportError::Timeout {
            agent: connection.agent(),
        });
    }
    Some(TransportError::Command {
        tool: tool.to_string(),
        status,
        stderr,
    })
}

/// v1 agents report a missing object as an error packet rather than a value.
fn is_missing_object(stderr: &str) -> bool {
    stderr.contains("(noSuchName)") || stderr.contains("There is no such variable name")
}

#[async_trait]
impl SnmpTransport for NetSnmpTransport {
    async fn fetch(&self, connection: &Connection, oid: &str) -> Result<SnmpValue, TransportError> {
        match self.run(SNMPGET, connection, oid).await? {
            Some(stdout) => Ok(decode_single(&stdout)),
            None => Ok(SnmpValue::Absent),
        }
    }

    async fn walk(&self, connection: &Connection, prefix: &str) -> Result<Vec<VarBind>, TransportError> {
        let entries = match self.run(SNMPWALK, connection, prefix).await? {
            Some(stdout) => decode_dump(&stdout),
            None => Vec::new(),
        };
        debug!(agent = %connection.agent(), prefix, entries = entries.len(), "snmpwalk");
        Ok(entries)
    }
}
