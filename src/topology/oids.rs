//! Object identifiers read during discovery.

// IF-MIB ifTable
pub const IF_INDEX: &str = "1.3.6.1.2.1.2.2.1.1";
pub const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
pub const IF_TYPE: &str = "1.3.6.1.2.1.2.2.1.3";
pub const IF_PHYS_ADDRESS: &str = "1.3.6.1.2.1.2.2.1.6";
pub const IF_OPER_STATUS: &str = "1.3.6.1.2.1.2.2.1.8";

// BRIDGE-MIB dot1dBasePortTable
pub const DOT1D_BASE_PORT: &str = "1.3.6.1.2.1.17.1.4.1.1";
pub const DOT1D_BASE_PORT_IF_INDEX: &str = "1.3.6.1.2.1.17.1.4.1.2";

// BRIDGE-MIB dot1dTpFdbTable, indexed by the address in decimal form
pub const DOT1D_TP_FDB_ADDRESS: &str = "1.3.6.1.2.1.17.4.3.1.1";
pub const DOT1D_TP_FDB_PORT: &str = "1.3.6.1.2.1.17.4.3.1.2";
pub const DOT1D_TP_FDB_STATUS: &str = "1.3.6.1.2.1.17.4.3.1.3";

// CISCO-VTP-MIB vtpVlanState, indexed by management domain then VLAN id
pub const VTP_VLAN_STATE: &str = "1.3.6.1.4.1.9.9.46.1.3.1.1.2";
// CISCO-VLAN-MEMBERSHIP-MIB vmVlan, indexed by ifIndex
pub const VM_VLAN: &str = "1.3.6.1.4.1.9.9.68.1.2.2.1.2";

// IP-MIB ipNetToMediaTable, indexed by ifIndex then IPv4 address
pub const IP_NET_TO_MEDIA_PHYS_ADDRESS: &str = "1.3.6.1.2.1.4.22.1.2";
pub const IP_NET_TO_MEDIA_NET_ADDRESS: &str = "1.3.6.1.2.1.4.22.1.3";

pub const OPER_STATUS_UP: i64 = 1;

/// dot1dTpFdbStatus values
pub const FDB_STATUS_LEARNED: i64 = 3;
pub const FDB_STATUS_SELF: i64 = 4;

/// `column.index`
pub fn instance(column: &str, index: impl std::fmt::Display) -> String {
    format!("{}.{}", column, index)
}
