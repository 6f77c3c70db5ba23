use crate::prelude::*;
use crate::transport::{ascii_exchange, with_deadline, AsciiTransport, DEFAULT_TCP_TIMEOUT};
use crate::voltronic::Terminator;

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Voltronic ASCII through a transparent TCP bridge (Elfin, SUNPOLO, ...).
#[derive(Clone, Debug)]
pub struct TcpLink {
    host: String,
    port: u16,
    timeout: Duration,
    terminator: Terminator,
}

impl TcpLink {
    /// Elfin bridges may end frames with LF alone, so that is accepted unless
    /// `with_line_feed(false)` is set.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout: DEFAULT_TCP_TIMEOUT,
            terminator: Terminator::CarriageReturnOrLineFeed,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_line_feed(mut self, line_feed: bool) -> Self {
        self.terminator = if line_feed {
            Terminator::CarriageReturnOrLineFeed
        } else {
            Terminator::CarriageReturn
        };
        self
    }
}

#[async_trait]
impl AsciiTransport for TcpLink {
    async fn transact(&self, command: &str) -> Result<String, ExchangeError> {
        with_deadline(self.timeout, async {
            let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
            ascii_exchange(stream, command, self.terminator).await
        })
        .await
    }

    fn describe(&self) -> String {
        format!("tcp {}:{}", self.host, self.port)
    }
}
