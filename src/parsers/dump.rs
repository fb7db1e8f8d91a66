use crate::data_aquisition::core::{SnmpValue, VarBind, normalize_oid};
use crate::parsers::value::decode_value;

/// Splits `snmpget`/`snmpwalk -On` output into `(oid, raw value)` pairs.
///
/// Values that span several lines (long strings, wrapped Hex-STRINGs) continue on lines without
/// ` = `; those are appended to the previous entry.
pub fn parse_dump(output: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(" = ") {
            Some((oid, value)) => entries.push((normalize_oid(oid), value.trim().to_string())),
            None => {
                if let Some((_, value)) = entries.last_mut() {
                    value.push('\n');
                    value.push_str(line.trim());
                }
            }
        }
    }
    entries
}

/// Parse and decode a dump, dropping entries that decode to `Absent`.
pub fn decode_dump(output: &str) -> Vec<VarBind> {
    parse_dump(output)
        .into_iter()
        .map(|(oid, raw)| VarBind::new(oid, decode_value(&raw)))
        .filter(|vb| !vb.value.is_absent())
        .collect()
}

/// The first value of a `snmpget` dump, or `Absent` if there is none.
pub fn decode_single(output: &str) -> SnmpValue {
    parse_dump(output)
        .into_iter()
        .next()
        .map(|(_, raw)| decode_value(&raw))
        .unwrap_or(SnmpValue::Absent)
}
