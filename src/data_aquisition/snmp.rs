use std::{collections::HashMap, io, net::Ipv4Addr, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use snmp2::{
    AsyncSession, Oid, Value,
    v3::{Auth, AuthProtocol, Security},
};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::data_aquisition::{
    connection::{Connection, Credentials, SnmpVersion},
    core::{SnmpTransport, SnmpValue, TransportError, VarBind, parse_oid},
};
use crate::network::mac::{MacAddress, try_parse_address};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_REPETITIONS: u32 = 25;

/// v1 error-status for a missing object, and the end of the MIB on GETNEXT
const NO_SUCH_NAME: u32 = 2;

type SharedSession = Arc<Mutex<Box<AsyncSession>>>;

/// SNMP transport speaking the protocol natively through `snmp2`.
///
/// One session is opened per distinct [`Connection`] (a VLAN-scoped community is a distinct
/// connection) and reused for every later request until it is released.
pub struct Snmp2Transport {
    timeout: Duration,
    max_repetitions: u32,
    sessions: Mutex<HashMap<Connection, SharedSession>>,
}

impl Default for Snmp2Transport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_MAX_REPETITIONS)
    }
}

impl Snmp2Transport {
    pub fn new(timeout: Duration, max_repetitions: u32) -> Self {
        Self {
            timeout,
            max_repetitions: max_repetitions.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Retrieves the cached session for `connection`, opening it on first use.
    async fn get_session(&self, connection: &Connection) -> Result<SharedSession, TransportError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(connection) {
            return Ok(session.clone());
        }

        let agent = connection.agent();
        debug!(agent = %agent, version = %connection.version(), "Opening SNMP session");
        let io_error = |source: io::Error| TransportError::Io {
            agent: agent.clone(),
            source,
        };
        let session = match (connection.version(), connection.credentials()) {
            (SnmpVersion::V1 | SnmpVersion::V2c, Credentials::Community(community)) => {
                Box::pin(open_community(connection.version(), &agent, community.as_bytes()))
                    .await
                    .map_err(io_error)?
            }
            (SnmpVersion::V3, Credentials::User { username, password }) => {
                let security = Security::new(username.as_bytes(), password.as_bytes())
                    .with_auth_protocol(AuthProtocol::Md5)
                    .with_auth(Auth::AuthNoPriv);
                let mut session = Box::pin(open_v3(&agent, security)).await.map_err(io_error)?;
                self.bounded(&agent, session.init())
                    .await?
                    .map_err(|e| snmp_error(&agent, e))?;
                session
            }
            // Connection::new rejects these combinations
            (version, _) => {
                return Err(TransportError::Snmp {
                    agent,
                    message: format!("credentials do not match {}", version),
                });
            }
        };

        let session = Arc::new(Mutex::new(session));
        sessions.insert(connection.clone(), session.clone());
        Ok(session)
    }

    async fn bounded<F: Future>(&self, agent: &str, fut: F) -> Result<F::Output, TransportError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout {
                agent: agent.to_string(),
            })
    }

    /// One GETBULK (GETNEXT on v1) step after `cursor`. Empty when the agent reports noSuchName.
    async fn next_batch(
        &self,
        connection: &Connection,
        session: &SharedSession,
        cursor: &[u64],
    ) -> Result<Vec<(Vec<u64>, Step)>, TransportError> {
        let agent = connection.agent();
        let oid = Oid::from(cursor).map_err(|_| TransportError::InvalidOid(format!("{:?}", cursor)))?;
        let mut session = session.lock().await;

        let response = if connection.version() == SnmpVersion::V1 {
            self.bounded(&agent, session.getnext(&oid)).await?
        } else {
            self.bounded(&agent, session.getbulk(&[&oid], 0, self.max_repetitions))
                .await?
        };
        let pdu = response.map_err(|e| snmp_error(&agent, e))?;

        if no_such_name(&agent, pdu.error_status, pdu.error_index)? {
            return Ok(Vec::new());
        }
        let batch: Vec<(Vec<u64>, Step)> = pdu
            .varbinds
            .map(|(oid, value)| (oid_components(&oid), Step::from(&value)))
            .collect();
        Ok(batch)
    }
}

/// Sessions carry their send and receive buffers inline, so they are built and kept boxed.
async fn open_community(version: SnmpVersion, agent: &str, community: &[u8]) -> io::Result<Box<AsyncSession>> {
    let session = if version == SnmpVersion::V1 {
        AsyncSession::new_v1(agent, community, 0).await?
    } else {
        AsyncSession::new_v2c(agent, community, 0).await?
    };
    Ok(Box::new(session))
}

async fn open_v3(agent: &str, security: Security) -> io::Result<Box<AsyncSession>> {
    Ok(Box::new(AsyncSession::new_v3(agent, 0, security).await?))
}

/// Reads a response's error-status. `Ok(true)` is noSuchName, any other error fails the request.
fn no_such_name(agent: &str, error_status: u32, error_index: u32) -> Result<bool, TransportError> {
    match error_status {
        0 => Ok(false),
        NO_SUCH_NAME => Ok(true),
        status => Err(TransportError::Snmp {
            agent: agent.to_string(),
            message: format!("error-status {} at index {}", status, error_index),
        }),
    }
}

#[async_trait]
impl SnmpTransport for Snmp2Transport {
    async fn fetch(&self, connection: &Connection, oid: &str) -> Result<SnmpValue, TransportError> {
        let agent = connection.agent();
        let oid = Oid::from_str(oid.trim_start_matches('.'))
            .map_err(|_| TransportError::InvalidOid(oid.to_string()))?;
        let session = self.get_session(connection).await?;
        let mut session = session.lock().await;

        let mut pdu = self
            .bounded(&agent, session.get(&oid))
            .await?
            .map_err(|e| snmp_error(&agent, e))?;
        if no_such_name(&agent, pdu.error_status, pdu.error_index)? {
            trace!(agent = %agent, "SNMP get: noSuchName");
            return Ok(SnmpValue::Absent);
        }
        let value = match pdu.varbinds.next() {
            Some((_, value)) => match Step::from(&value) {
                Step::Value(value) => value,
                Step::EndOfView => SnmpValue::Absent,
            },
            None => SnmpValue::Absent,
        };
        trace!(agent = %agent, ?value, "SNMP get");
        Ok(value)
    }

    async fn walk(&self, connection: &Connection, prefix: &str) -> Result<Vec<VarBind>, TransportError> {
        let root = parse_oid(prefix).ok_or_else(|| TransportError::InvalidOid(prefix.to_string()))?;
        let session = self.get_session(connection).await?;

        let mut entries = Vec::new();
        let mut cursor = root.clone();
        'walk: loop {
            let batch = self.next_batch(connection, &session, &cursor).await?;
            if batch.is_empty() {
                break;
            }
            for (components, step) in batch {
                // Left the subtree, ran off the MIB, or the agent is not advancing
                if !components.starts_with(&root) || components <= cursor {
                    break 'walk;
                }
                let value = match step {
                    Step::Value(value) => value,
                    Step::EndOfView => break 'walk,
                };
                cursor = components;
                if !value.is_absent() {
                    entries.push(VarBind::new(join_oid(&cursor), value));
                }
            }
        }
        debug!(agent = %connection.agent(), prefix, entries = entries.len(), "SNMP walk");
        Ok(entries)
    }

    async fn release(&self, connection: &Connection) {
        if self.sessions.lock().await.remove(connection).is_some() {
            debug!(agent = %connection.agent(), "Closed SNMP session");
        }
    }
}

/// A varbind as seen while walking: either a value or the end-of-view marker.
enum Step {
    Value(SnmpValue),
    EndOfView,
}

impl From<&Value<'_>> for Step {
    fn from(value: &Value) -> Self {
        match value {
            Value::EndOfMibView => Step::EndOfView,
            other => Step::Value(SnmpValue::from(other)),
        }
    }
}

impl From<&Value<'_>> for SnmpValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Integer(i) => SnmpValue::Integer(*i),
            Value::Counter32(c) => SnmpValue::Integer(*c as i64),
            Value::Unsigned32(u) => SnmpValue::Integer(*u as i64),
            Value::Timeticks(t) => SnmpValue::Integer(*t as i64),
            Value::Counter64(c) => i64::try_from(*c).map_or(SnmpValue::Absent, SnmpValue::Integer),
            Value::IpAddress(ip) => SnmpValue::Text(Ipv4Addr::from(*ip).to_string()),
            Value::OctetString(bytes) => octets_to_value(bytes),
            _ => SnmpValue::Absent,
        }
    }
}

/// Raw 6-byte strings are hardware addresses; printable strings may still spell one out.
fn octets_to_value(bytes: &[u8]) -> SnmpValue {
    let printable = !bytes.is_empty()
        && bytes
            .iter()
            .all(|b| b.is_ascii_graphic() || *b == b' ' || *b == b'\t');
    if printable {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        return match try_parse_address(&text) {
            Some(mac) => SnmpValue::Address(mac),
            None => SnmpValue::Text(text),
        };
    }
    match MacAddress::try_from(bytes) {
        Ok(mac) => SnmpValue::Address(mac),
        Err(_) if bytes.is_empty() => SnmpValue::Text(String::new()),
        Err(_) => SnmpValue::Text(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
    }
}

fn oid_components(oid: &Oid<'_>) -> Vec<u64> {
    oid.iter().map(|it| it.collect()).unwrap_or_default()
}

fn join_oid(components: &[u64]) -> String {
    components
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn snmp_error(agent: &str, e: snmp2::Error) -> TransportError {
    TransportError::Snmp {
        agent: agent.to_string(),
        message: format!("{e:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversion() {
        assert_eq!(SnmpValue::from(&Value::Integer(6)), SnmpValue::Integer(6));
        assert_eq!(SnmpValue::from(&Value::Counter32(7)), SnmpValue::Integer(7));
        assert_eq!(
            SnmpValue::from(&Value::IpAddress([10, 0, 0, 5])),
            SnmpValue::Text("10.0.0.5".to_string())
        );
        assert_eq!(SnmpValue::from(&Value::NoSuchInstance), SnmpValue::Absent);
        assert_eq!(SnmpValue::from(&Value::Null), SnmpValue::Absent);
    }

    #[test]
    fn test_octet_strings() {
        let raw = [0x00u8, 0x1b, 0x21, 0x3c, 0x4d, 0x5e];
        assert_eq!(
            SnmpValue::from(&Value::OctetString(&raw)),
            SnmpValue::Address(MacAddress::new(raw))
        );
        assert_eq!(
            SnmpValue::from(&Value::OctetString(b"GigabitEthernet0/1")),
            SnmpValue::Text("GigabitEthernet0/1".to_string())
        );
        assert_eq!(
            SnmpValue::from(&Value::OctetString(b"00:1b:21:3c:4d:5e")),
            SnmpValue::Address(MacAddress::new(raw))
        );
        assert_eq!(
            SnmpValue::from(&Value::OctetString(b"")),
            SnmpValue::Text(String::new())
        );
    }

    #[test]
    fn test_join_oid() {
        assert_eq!(join_oid(&[1, 3, 6, 1]), "1.3.6.1");
    }

    #[test]
    fn test_error_status() {
        assert!(!no_such_name("sw1:161", 0, 0).unwrap());
        assert!(no_such_name("sw1:161", NO_SUCH_NAME, 1).unwrap());
        assert!(matches!(
            no_such_name("sw1:161", 5, 1),
            Err(TransportError::Snmp { message, .. }) if message == "error-status 5 at index 1"
        ));
        assert!(no_such_name("sw1:161", 16, 0).is_err());
    }

    /// A v2c agent on loopback that answers every request through `respond`, echoing its community.
    mod agent {
        use tokio::net::UdpSocket;

        pub const INTEGER_1: [u8; 3] = [0x02, 0x01, 0x01];
        pub const INTEGER_2: [u8; 3] = [0x02, 0x01, 0x02];
        pub const INTEGER_3: [u8; 3] = [0x02, 0x01, 0x03];
        pub const END_OF_MIB_VIEW: [u8; 2] = [0x82, 0x00];

        /// Error-status and varbinds (OID, encoded value) of a response.
        pub type Reply = (u8, Vec<(Vec<u64>, Vec<u8>)>);

        fn tlv(tag: u8, body: &[u8]) -> Vec<u8> {
            let mut out = vec![tag];
            match body.len() {
                len @ 0..0x80 => out.push(len as u8),
                len @ 0x80..0x100 => out.extend([0x81, len as u8]),
                len => out.extend([0x82, (len >> 8) as u8, len as u8]),
            }
            out.extend_from_slice(body);
            out
        }

        fn encode_oid(components: &[u64]) -> Vec<u8> {
            let mut out = vec![(components[0] * 40 + components[1]) as u8];
            for &component in &components[2..] {
                let mut groups = vec![(component & 0x7f) as u8];
                let mut rest = component >> 7;
                while rest > 0 {
                    groups.push((rest & 0x7f) as u8 | 0x80);
                    rest >>= 7;
                }
                out.extend(groups.iter().rev());
            }
            out
        }

        fn decode_oid(bytes: &[u8]) -> Vec<u64> {
            let mut components = vec![u64::from(bytes[0] / 40), u64::from(bytes[0] % 40)];
            let mut current = 0u64;
            for &b in &bytes[1..] {
                current = (current << 7) | u64::from(b & 0x7f);
                if b & 0x80 == 0 {
                    components.push(current);
                    current = 0;
                }
            }
            components
        }

        struct Reader<'a> {
            buf: &'a [u8],
            pos: usize,
        }

        impl<'a> Reader<'a> {
            fn new(buf: &'a [u8]) -> Self {
                Self { buf, pos: 0 }
            }

            fn next_body(&mut self) -> &'a [u8] {
                let first = self.buf[self.pos + 1] as usize;
                let (len, header) = if first < 0x80 {
                    (first, 2)
                } else {
                    let n = first & 0x7f;
                    let len = self.buf[self.pos + 2..self.pos + 2 + n]
                        .iter()
                        .fold(0, |acc, b| (acc << 8) | *b as usize);
                    (len, 2 + n)
                };
                let start = self.pos + header;
                self.pos = start + len;
                &self.buf[start..start + len]
            }
        }

        struct Request {
            community: Vec<u8>,
            request_id: Vec<u8>,
            oid: Vec<u64>,
        }

        /// Community, request-id and first varbind OID of a request.
        fn parse_request(buf: &[u8]) -> Request {
            let message = Reader::new(buf).next_body();
            let mut message = Reader::new(message);
            message.next_body(); // version
            let community = message.next_body().to_vec();
            let mut pdu = Reader::new(message.next_body());
            let request_id = pdu.next_body().to_vec();
            pdu.next_body();
            pdu.next_body();
            let varbinds = pdu.next_body();
            let varbind = Reader::new(varbinds).next_body();
            let oid = Reader::new(varbind).next_body();
            Request {
                community,
                request_id,
                oid: decode_oid(oid),
            }
        }

        fn encode_response(request: &Request, (status, varbinds): Reply) -> Vec<u8> {
            let list: Vec<u8> = varbinds
                .iter()
                .flat_map(|(oid, value)| tlv(0x30, &[tlv(0x06, &encode_oid(oid)), value.clone()].concat()))
                .collect();
            let index = u8::from(status != 0);
            let pdu = [
                tlv(0x02, &request.request_id),
                tlv(0x02, &[status]),
                tlv(0x02, &[index]),
                tlv(0x30, &list),
            ]
            .concat();
            let message = [tlv(0x02, &[1]), tlv(0x04, &request.community), tlv(0xA2, &pdu)].concat();
            tlv(0x30, &message)
        }

        /// Bind the agent and return its port.
        pub async fn spawn<F>(respond: F) -> u16
        where
            F: Fn(&[u64]) -> Reply + Send + 'static,
        {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let port = socket.local_addr().unwrap().port();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
                    let request = parse_request(&buf[..n]);
                    let response = encode_response(&request, respond(&request.oid));
                    let _ = socket.send_to(&response, peer).await;
                }
            });
            port
        }
    }

    const FDB_ADDRESS: [u64; 11] = [1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 1];

    fn row(column: &[u64], index: u64) -> Vec<u64> {
        let mut oid = column.to_vec();
        oid.push(index);
        oid
    }

    fn loopback(port: u16) -> Connection {
        Connection::new(
            "127.0.0.1",
            port,
            SnmpVersion::V2c,
            Credentials::Community("public".into()),
        )
        .unwrap()
    }

    fn transport() -> Snmp2Transport {
        Snmp2Transport::new(Duration::from_secs(1), 3)
    }

    #[tokio::test]
    async fn test_gen_err_fails_requests() {
        let port = agent::spawn(|oid| (5, vec![(oid.to_vec(), vec![0x05, 0x00])])).await;
        let conn = loopback(port);
        let transport = transport();

        assert!(matches!(
            transport.fetch(&conn, "1.3.6.1.2.1.2.2.1.3.1").await,
            Err(TransportError::Snmp { .. })
        ));
        assert!(matches!(
            transport.walk(&conn, "1.3.6.1.2.1.17.4.3.1.1").await,
            Err(TransportError::Snmp { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_such_name_is_absent() {
        let port = agent::spawn(|oid| (2, vec![(oid.to_vec(), vec![0x05, 0x00])])).await;
        let conn = loopback(port);
        let transport = transport();

        assert_eq!(
            transport.fetch(&conn, "1.3.6.1.2.1.2.2.1.3.1").await.unwrap(),
            SnmpValue::Absent
        );
        assert!(transport.walk(&conn, "1.3.6.1.2.1.17.4.3.1.1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_value() {
        let port = agent::spawn(|oid| (0, vec![(oid.to_vec(), agent::INTEGER_2.to_vec())])).await;
        let value = transport()
            .fetch(&loopback(port), ".1.3.6.1.2.1.2.2.1.8.1")
            .await
            .unwrap();
        assert_eq!(value, SnmpValue::Integer(2));
    }

    #[tokio::test]
    async fn test_walk_stops_outside_subtree() {
        let port = agent::spawn(|oid| {
            let varbinds = if oid == FDB_ADDRESS {
                vec![
                    (row(&FDB_ADDRESS, 1), agent::INTEGER_1.to_vec()),
                    (row(&FDB_ADDRESS, 2), agent::INTEGER_2.to_vec()),
                ]
            } else {
                // Next column
                vec![
                    (row(&FDB_ADDRESS, 3), agent::INTEGER_3.to_vec()),
                    (vec![1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2, 1], agent::INTEGER_1.to_vec()),
                ]
            };
            (0, varbinds)
        })
        .await;

        let entries = transport().walk(&loopback(port), "1.3.6.1.2.1.17.4.3.1.1").await.unwrap();
        let oids: Vec<&str> = entries.iter().map(|vb| vb.oid.as_str()).collect();
        assert_eq!(
            oids,
            vec!["1.3.6.1.2.1.17.4.3.1.1.1", "1.3.6.1.2.1.17.4.3.1.1.2", "1.3.6.1.2.1.17.4.3.1.1.3"]
        );
        assert_eq!(entries[2].value, SnmpValue::Integer(3));
    }

    #[tokio::test]
    async fn test_walk_stops_at_end_of_mib_view() {
        let port = agent::spawn(|_| {
            (
                0,
                vec![
                    (row(&FDB_ADDRESS, 1), agent::INTEGER_1.to_vec()),
                    (row(&FDB_ADDRESS, 2), agent::END_OF_MIB_VIEW.to_vec()),
                ],
            )
        })
        .await;

        let entries = transport().walk(&loopback(port), "1.3.6.1.2.1.17.4.3.1.1").await.unwrap();
        assert_eq!(entries, vec![VarBind::new("1.3.6.1.2.1.17.4.3.1.1.1", SnmpValue::Integer(1))]);
    }

    #[tokio::test]
    async fn test_walk_stops_when_agent_repeats() {
        // Always answers with the same row, whatever was asked
        let port = agent::spawn(|_| (0, vec![(row(&FDB_ADDRESS, 1), agent::INTEGER_1.to_vec())])).await;

        let entries = transport().walk(&loopback(port), "1.3.6.1.2.1.17.4.3.1.1").await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_release_closes_session() {
        let port = agent::spawn(|oid| (0, vec![(oid.to_vec(), agent::INTEGER_1.to_vec())])).await;
        let transport = transport();
        let base = loopback(port);
        let scoped = base.for_vlan(Some(10));

        transport.fetch(&base, "1.3.6.1.2.1.1.3.0").await.unwrap();
        transport.fetch(&scoped, "1.3.6.1.2.1.1.3.0").await.unwrap();
        assert_eq!(transport.sessions.lock().await.len(), 2);

        transport.release(&scoped).await;
        let sessions = transport.sessions.lock().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key(&base));
    }
}
