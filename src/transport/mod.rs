//! One short-lived connection per request.
//!
//! A link opens its connection, writes one framed request, reads exactly one
//! response frame and drops the connection, all under a single deadline.

pub mod modbus;
pub mod serial;
pub mod tcp;

use crate::prelude::*;
use crate::voltronic::{codec, Terminator, VoltronicCodec};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

pub use self::modbus::{ModbusLink, WriteOutcome};
pub use self::serial::SerialLink;
pub use self::tcp::TcpLink;

pub const DEFAULT_SERIAL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MODBUS_TIMEOUT: Duration = Duration::from_secs(10);

/// A link carrying Voltronic ASCII exchanges.
#[async_trait]
pub trait AsciiTransport: Send + Sync {
    /// Sends `command` and returns the response text with its CRC and
    /// terminator removed.
    async fn transact(&self, command: &str) -> Result<String, ExchangeError>;

    fn describe(&self) -> String;
}

/// Runs `exchange` under `deadline`. Whatever the exchange owns (the socket
/// or serial port) is dropped when it finishes or the deadline fires.
pub async fn with_deadline<T, F>(deadline: Duration, exchange: F) -> Result<T, ExchangeError>
where
    F: Future<Output = Result<T, ExchangeError>>,
{
    match tokio::time::timeout(deadline, exchange).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::Timeout(deadline.as_millis() as u64)),
    }
}

/// Writes one framed command to `stream` and reads back the first frame.
pub async fn ascii_exchange<S>(
    stream: S,
    command: &str,
    terminator: Terminator,
) -> Result<String, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, VoltronicCodec::new(terminator));

    debug!("TX {} {:02X?}", command, codec::packet_for(command));
    framed.send(command.to_string()).await?;

    match framed.next().await {
        Some(Ok(frame)) => {
            debug!("RX {:02X?}", &frame[..]);
            Ok(codec::response_text(&frame))
        }
        Some(Err(e)) => Err(e.into()),
        None => Err(ExchangeError::ShortResponse(framed.read_buffer().len())),
    }
}
