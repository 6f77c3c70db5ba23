use crate::modbus::frame::{self, EXCEPTION_TAIL_LEN, WRITE_MULTIPLE, WRITE_RESPONSE_LEN, WRITE_SINGLE};
use crate::prelude::*;
use crate::transport::{with_deadline, DEFAULT_MODBUS_TIMEOUT};

use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

pub const DEFAULT_UNIT_ID: u8 = 1;

/// Result of a single-register write with 0x06 → 0x10 fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { function: u8 },
    Failed {
        single: ExchangeError,
        multiple: ExchangeError,
    },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written { function } => write!(f, "written with function 0x{:02X}", function),
            Self::Failed { single, multiple } => write!(
                f,
                "write failed: function 0x{:02X}: {}; function 0x{:02X}: {}",
                WRITE_SINGLE, single, WRITE_MULTIPLE, multiple
            ),
        }
    }
}

/// Modbus RTU over a raw TCP socket. Every call opens its own connection.
#[derive(Clone, Debug)]
pub struct ModbusLink {
    host: String,
    port: u16,
    unit_id: u8,
    timeout: Duration,
}

impl ModbusLink {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            unit_id: DEFAULT_UNIT_ID,
            timeout: DEFAULT_MODBUS_TIMEOUT,
        }
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn describe(&self) -> String {
        format!("modbus {}:{} unit {}", self.host, self.port, self.unit_id)
    }

    async fn connect(&self) -> Result<TcpStream, ExchangeError> {
        Ok(TcpStream::connect((self.host.as_str(), self.port)).await?)
    }

    pub async fn read_holding(&self, address: u16, quantity: u16) -> Result<Vec<u16>, ExchangeError> {
        with_deadline(self.timeout, async {
            let mut stream = self.connect().await?;
            read_holding_on(&mut stream, self.unit_id, address, quantity).await
        })
        .await
    }

    /// Writes one holding register, first with 0x06 and then, if that fails for
    /// any reason, with 0x10. Each attempt gets its own connection and deadline.
    pub async fn write_register(&self, address: u16, value: u16) -> WriteOutcome {
        let single = with_deadline(self.timeout, async {
            let mut stream = self.connect().await?;
            write_on(&mut stream, self.unit_id, WRITE_SINGLE, address, value).await
        })
        .await;

        let single = match single {
            Ok(()) => return WriteOutcome::Written { function: WRITE_SINGLE },
            Err(e) => e,
        };
        warn!(
            "{}: write {}={} with 0x06 failed ({}), retrying with 0x10",
            self.describe(),
            address,
            value,
            single
        );

        let multiple = with_deadline(self.timeout, async {
            let mut stream = self.connect().await?;
            write_on(&mut stream, self.unit_id, WRITE_MULTIPLE, address, value).await
        })
        .await;

        match multiple {
            Ok(()) => WriteOutcome::Written {
                function: WRITE_MULTIPLE,
            },
            Err(multiple) => WriteOutcome::Failed { single, multiple },
        }
    }
}

/// Reads `quantity` holding registers from `address` over an open stream.
pub async fn read_holding_on<S>(
    stream: &mut S,
    unit: u8,
    address: u16,
    quantity: u16,
) -> Result<Vec<u16>, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = frame::read_request(unit, address, quantity);
    debug!("TX {:02X?}", request);
    stream.write_all(&request).await?;

    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;

    if frame::is_exception(header[1]) {
        let mut tail = [0u8; EXCEPTION_TAIL_LEN];
        stream.read_exact(&mut tail).await?;
        return Err(frame::exception(unit, header, tail));
    }

    let byte_count = stream.read_u8().await?;
    if byte_count % 2 != 0 {
        return Err(ExchangeError::OddByteCount(byte_count));
    }

    let mut rest = vec![0u8; byte_count as usize + 2];
    stream.read_exact(&mut rest).await?;
    debug!("RX {:02X?} {:02X} {:02X?}", header, byte_count, rest);

    frame::parse_read_response(unit, header, byte_count, &rest, quantity)
}

/// Writes one register with `function` (0x06 or 0x10) over an open stream.
pub async fn write_on<S>(
    stream: &mut S,
    unit: u8,
    function: u8,
    address: u16,
    value: u16,
) -> Result<(), ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = if function == WRITE_MULTIPLE {
        frame::write_multiple_request(unit, address, value)
    } else {
        frame::write_single_request(unit, address, value)
    };
    debug!("TX {:02X?}", request);
    stream.write_all(&request).await?;

    let mut response = [0u8; WRITE_RESPONSE_LEN];
    stream.read_exact(&mut response[..2]).await?;

    if frame::is_exception(response[1]) {
        let mut tail = [0u8; EXCEPTION_TAIL_LEN];
        stream.read_exact(&mut tail).await?;
        return Err(frame::exception(unit, [response[0], response[1]], tail));
    }

    stream.read_exact(&mut response[2..]).await?;
    debug!("RX {:02X?}", response);

    frame::parse_write_response(unit, function, &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc;
    use tokio::io::duplex;

    #[tokio::test]
    async fn reads_registers() {
        let (mut client, mut device) = duplex(256);
        tokio::spawn(async move {
            let mut request = [0u8; 8];
            device.read_exact(&mut request).await.unwrap();
            assert_eq!(&request[..6], &[0x01, 0x03, 0x00, 0xC9, 0x00, 0x02]);

            let mut reply = vec![0x01, 0x03, 0x04, 0x0A, 0x5A, 0xFE, 0xA2];
            let trailer = crc::modbus_bytes(&reply);
            reply.extend_from_slice(&trailer);
            device.write_all(&reply).await.unwrap();
        });

        let values = read_holding_on(&mut client, 1, 201, 2).await;
        assert_eq!(values, Ok(vec![2650, 65186]));
    }

    #[tokio::test]
    async fn exception_is_reported() {
        let (mut client, mut device) = duplex(256);
        tokio::spawn(async move {
            let mut request = [0u8; 8];
            device.read_exact(&mut request).await.unwrap();

            let mut reply = vec![0x01, 0x86, 0x03];
            let trailer = crc::modbus_bytes(&reply);
            reply.extend_from_slice(&trailer);
            device.write_all(&reply).await.unwrap();
        });

        let result = write_on(&mut client, 1, WRITE_SINGLE, 301, 2).await;
        assert_eq!(
            result,
            Err(ExchangeError::Exception {
                function: WRITE_SINGLE,
                code: 3
            })
        );
    }

    #[tokio::test]
    async fn short_read() {
        let (mut client, mut device) = duplex(256);
        tokio::spawn(async move {
            let mut request = [0u8; 8];
            device.read_exact(&mut request).await.unwrap();
            device.write_all(&[0x01, 0x03, 0x04, 0x00]).await.unwrap();
        });

        let result = read_holding_on(&mut client, 1, 201, 2).await;
        assert_eq!(result, Err(ExchangeError::ShortResponse(0)));
    }

    #[test]
    fn failure_names_both_causes() {
        let outcome = WriteOutcome::Failed {
            single: ExchangeError::Exception {
                function: WRITE_SINGLE,
                code: 1,
            },
            multiple: ExchangeError::Timeout(10000),
        };
        let message = outcome.to_string();
        assert!(message.contains("0x06"));
        assert!(message.contains("0x10"));
        assert!(message.contains("modbus exception 0x01"));
        assert!(message.contains("timeout after 10000ms"));
    }
}
