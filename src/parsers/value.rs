/*!
Decoder for single values in the textual dump format printed by the net-snmp tools
(`INTEGER: up(1)`, `Hex-STRING: 00 11 22 33 44 55`, `STRING: "Gi0/1"`, ...).

Agents and tool versions differ in wording, so classification is a fixed, ordered list of
independent rules. The first rule that recognizes the line wins; a line nothing recognizes
decodes to `SnmpValue::Absent` and is logged.
*/

use tracing::{trace, warn};

use crate::data_aquisition::core::SnmpValue;
use crate::network::mac::{MacAddress, try_parse_address};

/// A classification rule. `None` means "not mine", pass the line to the next rule.
pub type DecodeRule = fn(&str) -> Option<SnmpValue>;

pub const RULES: [(&str, DecodeRule); 4] = [
    ("absent", decode_absent),
    ("integer", decode_integer),
    ("hex-string", decode_hex_string),
    ("text", decode_text),
];

const ABSENCE_MARKERS: [&str; 3] = ["no such object", "no such instance", "no more variables left"];
const INTEGER_MARKERS: [&str; 5] = ["INTEGER:", "Gauge32:", "Counter32:", "Counter64:", "Unsigned32:"];
const HEX_MARKER: &str = "Hex-STRING:";
const TEXT_MARKERS: [&str; 2] = ["STRING:", "IpAddress:"];

/// Decode one value (optionally still prefixed with `oid = `).
pub fn decode_value(line: &str) -> SnmpValue {
    for (name, rule) in RULES {
        if let Some(value) = rule(line) {
            trace!(rule = name, line, "decoded SNMP value");
            return value;
        }
    }
    warn!(line, "Unrecognized SNMP value, treating as absent");
    SnmpValue::Absent
}

/// Text after the first occurrence of `marker`.
fn payload_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|pos| &line[pos + marker.len()..])
}

pub fn decode_absent(line: &str) -> Option<SnmpValue> {
    let lower = line.to_lowercase();
    ABSENCE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
        .then_some(SnmpValue::Absent)
}

/// `INTEGER: 6` or `INTEGER: ethernetCsmacd(6)`. The bare number is preferred.
pub fn decode_integer(line: &str) -> Option<SnmpValue> {
    let payload = INTEGER_MARKERS
        .iter()
        .find_map(|marker| payload_after(line, marker))?
        .trim();

    if let Some(bare) = payload.split_whitespace().next()
        && let Ok(value) = bare.parse::<i64>()
    {
        return Some(SnmpValue::Integer(value));
    }

    let open = payload.find('(')?;
    let close = payload[open..].find(')')? + open;
    payload[open + 1..close]
        .trim()
        .parse::<i64>()
        .ok()
        .map(SnmpValue::Integer)
}

/// `Hex-STRING: 00 11 22 33 44 55`. Only byte sequences that form an address are claimed here;
/// anything else falls through to the text rule.
pub fn decode_hex_string(line: &str) -> Option<SnmpValue> {
    let payload = payload_after(line, HEX_MARKER)?;
    let parts: Vec<&str> = payload.split_whitespace().collect();
    MacAddress::from_hex_parts(&parts).ok().map(SnmpValue::Address)
}

/// `STRING: ...` or `IpAddress: ...`. Some agents print hardware addresses as plain strings,
/// so the payload is tried as an address first.
pub fn decode_text(line: &str) -> Option<SnmpValue> {
    let payload = TEXT_MARKERS
        .iter()
        .find_map(|marker| payload_after(line, marker))?;
    let text = strip_quotes(payload.trim());
    Some(match try_parse_address(text) {
        Some(mac) => SnmpValue::Address(mac),
        None => SnmpValue::Text(text.to_string()),
    })
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}
