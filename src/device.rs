//! The core boundary: run one command or one setting against one endpoint.
//!
//! `execute` and `write` never fail. Every transport, framing or protocol
//! problem comes back as a `Decoded::Error`.

use crate::modbus::{mimicry, registers, RegisterBlock, CONFIG_COMMAND, SENSORS_COMMAND};
use crate::prelude::*;
use crate::transport::{AsciiTransport, ModbusLink, SerialLink, TcpLink, WriteOutcome};
use crate::voltronic::{codec, decoder, Command, Setting, SettingCommand};

use std::time::Duration;

/// Per-endpoint link options. `None` timeouts use the per-family default.
#[derive(Clone, Debug)]
pub struct LinkOptions {
    pub timeout: Option<Duration>,
    pub unit_id: u8,
    pub line_feed_terminator: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            unit_id: crate::transport::modbus::DEFAULT_UNIT_ID,
            line_feed_terminator: true,
        }
    }
}

/// The codec family, fixed once when the device is created.
pub enum Link {
    Voltronic(Box<dyn AsciiTransport>),
    Modbus(ModbusLink),
}

impl Link {
    pub fn for_endpoint(endpoint: &Endpoint, options: &LinkOptions) -> Self {
        match endpoint {
            Endpoint::Serial { path } => {
                let mut link = SerialLink::new(path);
                if let Some(timeout) = options.timeout {
                    link = link.with_timeout(timeout);
                }
                Self::Voltronic(Box::new(link))
            }
            Endpoint::Tcp { host, port } => {
                let mut link = TcpLink::new(host, *port).with_line_feed(options.line_feed_terminator);
                if let Some(timeout) = options.timeout {
                    link = link.with_timeout(timeout);
                }
                Self::Voltronic(Box::new(link))
            }
            Endpoint::Modbus { host, port } => {
                let mut link = ModbusLink::new(host, *port).with_unit_id(options.unit_id);
                if let Some(timeout) = options.timeout {
                    link = link.with_timeout(timeout);
                }
                Self::Modbus(link)
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Voltronic(t) => t.describe(),
            Self::Modbus(m) => m.describe(),
        }
    }
}

pub struct Device {
    endpoint: Endpoint,
    link: Link,
}

impl Device {
    pub fn new(endpoint: Endpoint, options: &LinkOptions) -> Self {
        let link = Link::for_endpoint(&endpoint, options);
        Self { endpoint, link }
    }

    /// Uses `link` instead of the one the endpoint would select.
    pub fn with_link(endpoint: Endpoint, link: Link) -> Self {
        Self { endpoint, link }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn family(&self) -> ProtocolFamily {
        match self.link {
            Link::Voltronic(_) => ProtocolFamily::Voltronic,
            Link::Modbus(_) => ProtocolFamily::Modbus,
        }
    }

    /// Runs a query command and decodes its response.
    pub async fn execute(&self, command: &str) -> Decoded {
        let decoded = match &self.link {
            Link::Voltronic(transport) => match transport.transact(command).await {
                Ok(text) => decoder::decode(command, &text),
                Err(e) => Decoded::error(e.to_string()),
            },
            Link::Modbus(link) => Self::execute_modbus(link, command).await,
        };

        if let Some(e) = decoded.error_message() {
            warn!("{}: {} failed: {}", self.link.describe(), command, e);
        } else {
            debug!("{}: {} -> {} fields", self.link.describe(), command, decoded.len());
        }
        decoded
    }

    async fn read_sensors(link: &ModbusLink) -> Decoded {
        match link
            .read_holding(registers::SENSOR_BLOCK_START, registers::SENSOR_BLOCK_COUNT)
            .await
        {
            Ok(values) => registers::decode_sensors(&RegisterBlock::new(registers::SENSOR_BLOCK_START, values)),
            Err(e) => Decoded::error(e.to_string()),
        }
    }

    async fn read_config(link: &ModbusLink) -> Decoded {
        match link
            .read_holding(registers::CONFIG_BLOCK_START, registers::CONFIG_BLOCK_COUNT)
            .await
        {
            Ok(values) => registers::decode_config(&RegisterBlock::new(registers::CONFIG_BLOCK_START, values)),
            Err(e) => Decoded::error(e.to_string()),
        }
    }

    async fn execute_modbus(link: &ModbusLink, command: &str) -> Decoded {
        let name = command.trim().to_ascii_uppercase();
        match Command::from_name(&name) {
            Command::Qpigs => mimicry::qpigs(&Self::read_sensors(link).await),
            Command::Qpiri => mimicry::qpiri(&Self::read_config(link).await),
            Command::Qmod => mimicry::qmod(&Self::read_sensors(link).await),
            _ if name == SENSORS_COMMAND => Self::read_sensors(link).await,
            _ if name == CONFIG_COMMAND => Self::read_config(link).await,
            _ => Decoded::error(format!("{} is not supported over modbus", command)),
        }
    }

    /// Applies one setting.
    ///
    /// ASCII devices answer `{status: ACK}` or `{status: NAK}`; Modbus devices
    /// answer `{status: OK}` once either write function succeeds.
    pub async fn write(&self, setting: &Setting) -> Decoded {
        let result = match &self.link {
            Link::Voltronic(transport) => {
                let command = setting.ascii_command();
                match transport.transact(&command).await {
                    Ok(text) => codec::write_status(&text),
                    Err(e) => Decoded::error(e.to_string()),
                }
            }
            Link::Modbus(link) => match setting.holding_register() {
                Some((register, value)) => match link.write_register(register, value).await {
                    WriteOutcome::Written { .. } => Decoded::status("OK"),
                    failed => Decoded::error(failed.to_string()),
                },
                None => Decoded::error(format!("{} is not supported over modbus", setting.key())),
            },
        };

        info!(
            "{}: set {} -> {}",
            self.link.describe(),
            setting.key(),
            serde_json::to_string(&result).unwrap_or_default()
        );
        result
    }
}

/// One-shot `execute` with default link options.
pub async fn execute(endpoint: &Endpoint, command: &str) -> Decoded {
    Device::new(endpoint.clone(), &LinkOptions::default())
        .execute(command)
        .await
}

/// One-shot `write` with default link options.
pub async fn write(endpoint: &Endpoint, setting: &Setting) -> Decoded {
    Device::new(endpoint.clone(), &LinkOptions::default())
        .write(setting)
        .await
}
