pub mod config;
pub mod data_aquisition;
pub mod network;
pub mod parsers;
pub mod render;
pub mod topology;
