//! Voltronic ASCII protocol family (serial and TCP bridges).

pub mod codec;
pub mod command;
pub mod decoder;
pub mod enums;
pub mod setting;

pub use codec::{Terminator, VoltronicCodec};
pub use command::Command;
pub use decoder::decode;
pub use setting::{Setting, SettingCommand};
