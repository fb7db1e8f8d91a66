/*
 * This module defines the switch/port/device model that discovery fills in.
 * It also provides the protocol-agnostic graph handed to renderers.
 */

pub mod graph;
pub mod mac;
pub mod node;
pub mod switch;
