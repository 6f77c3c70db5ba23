pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use tokio::sync::{broadcast, mpsc, oneshot};

pub use crate::config::{self, Config, ConfigWrapper};
pub use crate::decoded::{Decoded, FieldValue};
pub use crate::endpoint::{Endpoint, ProtocolFamily};
pub use crate::error::ExchangeError;
pub use crate::modbus;
pub use crate::options::Options;
pub use crate::queue::CommandQueue;
pub use crate::voltronic;
