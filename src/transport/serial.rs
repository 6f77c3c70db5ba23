use crate::prelude::*;
use crate::transport::{ascii_exchange, with_deadline, AsciiTransport, DEFAULT_SERIAL_TIMEOUT};
use crate::voltronic::Terminator;

use async_trait::async_trait;
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

pub const BAUD_RATE: u32 = 2400;

/// Voltronic ASCII over a local serial port, 2400 8N1, CR terminated.
#[derive(Clone, Debug)]
pub struct SerialLink {
    path: String,
    timeout: Duration,
}

impl SerialLink {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            timeout: DEFAULT_SERIAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AsciiTransport for SerialLink {
    async fn transact(&self, command: &str) -> Result<String, ExchangeError> {
        with_deadline(self.timeout, async {
            let port = tokio_serial::new(&self.path, BAUD_RATE)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .open_native_async()
                .map_err(|e| ExchangeError::Io(format!("{}: {}", self.path, e)))?;

            ascii_exchange(port, command, Terminator::CarriageReturn).await
        })
        .await
    }

    fn describe(&self) -> String {
        format!("serial {}", self.path)
    }
}
