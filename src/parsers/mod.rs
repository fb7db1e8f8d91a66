/*
This module turns textual SNMP tool output into typed values.

--- data_aquisition module ---
snmpget/snmpwalk stdout
|
| `dump`: split into (oid, raw value) entries
v
| `value`: classify each raw value as absent/integer/address/text
v
--- topology module ---
*/

pub mod dump;
pub mod value;
