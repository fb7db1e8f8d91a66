//! Canned-response transport for tests: agents are snmpwalk dumps keyed by community.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::data_aquisition::{
    connection::{Connection, Credentials},
    core::{SnmpTransport, SnmpValue, TransportError, VarBind, normalize_oid, oid_within},
};
use crate::parsers::dump::decode_dump;

#[derive(Default)]
pub struct FakeTransport {
    dumps: HashMap<String, Vec<VarBind>>,
    failing_prefixes: Vec<String>,
    failing_credentials: Vec<String>,
    requests: Mutex<Vec<(String, String)>>,
    released: Mutex<Vec<Connection>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `dump` to requests made with `community` (or v3 username).
    pub fn with_dump(mut self, community: &str, dump: &str) -> Self {
        self.dumps
            .entry(community.to_string())
            .or_default()
            .extend(decode_dump(dump));
        self
    }

    /// Any request under `prefix` fails like an unreachable agent.
    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.failing_prefixes.push(normalize_oid(prefix));
        self
    }

    /// Every request made with `credential` fails like an unreachable agent.
    pub fn failing_for(mut self, credential: &str) -> Self {
        self.failing_credentials.push(credential.to_string());
        self
    }

    /// `(credential, oid)` of every request made so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Connections released so far, in order.
    pub fn released(&self) -> Vec<Connection> {
        self.released.lock().unwrap().clone()
    }

    fn entries(&self, connection: &Connection, oid: &str) -> Result<&[VarBind], TransportError> {
        let key = match connection.credentials() {
            Credentials::Community(c) => c.clone(),
            Credentials::User { username, .. } => username.clone(),
        };
        self.requests
            .lock()
            .unwrap()
            .push((key.clone(), normalize_oid(oid)));
        if self.failing_credentials.contains(&key) || self.failing_prefixes.iter().any(|p| oid_within(oid, p)) {
            return Err(TransportError::Timeout {
                agent: connection.agent(),
            });
        }
        Ok(self.dumps.get(&key).map(Vec::as_slice).unwrap_or_default())
    }
}

#[async_trait]
impl SnmpTransport for FakeTransport {
    async fn fetch(&self, connection: &Connection, oid: &str) -> Result<SnmpValue, TransportError> {
        let oid = normalize_oid(oid);
        Ok(self
            .entries(connection, &oid)?
            .iter()
            .find(|vb| vb.oid == oid)
            .map(|vb| vb.value.clone())
            .unwrap_or(SnmpValue::Absent))
    }

    async fn walk(&self, connection: &Connection, prefix: &str) -> Result<Vec<VarBind>, TransportError> {
        let prefix = normalize_oid(prefix);
        Ok(self
            .entries(connection, &prefix)?
            .iter()
            .filter(|vb| oid_within(&vb.oid, &prefix))
            .cloned()
            .collect())
    }

    async fn release(&self, connection: &Connection) {
        self.released.lock().unwrap().push(connection.clone());
    }
}
