/*
 * This module provides data aquisition abilites for the application.
 * It doesn't care what the tables mean, just how values are fetched and walked.
 * Transports (native SNMP, the net-snmp tools, canned dumps in tests) all hand out `SnmpValue`s.
 */

pub mod connection;
pub mod core;
pub mod net_snmp;
pub mod snmp;

#[cfg(test)]
pub(crate) mod fake;
