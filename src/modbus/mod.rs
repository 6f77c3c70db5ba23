//! Modbus RTU over raw TCP, limited to the two register blocks and the write
//! functions these inverters use.

pub mod frame;
pub mod mimicry;
pub mod registers;

pub use registers::{RegisterBlock, CONFIG_BLOCK_COUNT, CONFIG_BLOCK_START, SENSOR_BLOCK_COUNT, SENSOR_BLOCK_START};

/// Pseudo-commands returning the decoded register blocks without mimicry.
pub const SENSORS_COMMAND: &str = "SENSORS";
pub const CONFIG_COMMAND: &str = "CONFIG";
