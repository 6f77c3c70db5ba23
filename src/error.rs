use std::fmt;

/// Creates an anyhow error with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*)
        )
    };
}

/// Creates an anyhow error with the current file and line number, and includes a source error
#[macro_export]
macro_rules! file_error_with_source {
    ($source:expr, $($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}: {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*),
            $source
        )
    };
}

/// Why a single request/response exchange on the wire failed.
///
/// These stay inside the core: `Device::execute` and `Device::write` fold them
/// into a `Decoded::Error` instead of returning them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeError {
    /// Connect, write or read did not finish before the deadline.
    Timeout(u64),
    /// Connection refused, reset, port missing, etc.
    Io(String),
    /// Peer closed the connection before a complete frame arrived.
    ShortResponse(usize),
    Crc { expected: [u8; 2], got: [u8; 2] },
    UnitMismatch { expected: u8, got: u8 },
    FunctionMismatch { expected: u8, got: u8 },
    OddByteCount(u8),
    /// Modbus exception response (function code high bit set).
    Exception { function: u8, code: u8 },
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ExchangeError::*;

        match self {
            Timeout(ms) => write!(f, "timeout after {}ms", ms),
            Io(e) => write!(f, "i/o error: {}", e),
            ShortResponse(n) => write!(f, "short response: connection closed after {} bytes", n),
            Crc { expected, got } => write!(
                f,
                "CRC mismatch: expected {:02X?}, got {:02X?}",
                expected, got
            ),
            UnitMismatch { expected, got } => {
                write!(f, "unit id mismatch: expected {}, got {}", expected, got)
            }
            FunctionMismatch { expected, got } => write!(
                f,
                "function code mismatch: expected 0x{:02X}, got 0x{:02X}",
                expected, got
            ),
            OddByteCount(n) => write!(f, "odd byte count {} in register response", n),
            Exception { function, code } => write!(
                f,
                "modbus exception 0x{:02X} for function 0x{:02X}",
                code, function
            ),
        }
    }
}

impl std::error::Error for ExchangeError {}

impl From<std::io::Error> for ExchangeError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::ShortResponse(0),
            _ => Self::Io(e.to_string()),
        }
    }
}
