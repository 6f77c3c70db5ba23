#![allow(dead_code)]

use inverter_link::crc;
use inverter_link::modbus::frame;
use inverter_link::prelude::*;

use std::net::SocketAddr;
use std::sync::Once;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

pub fn common_setup() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "debug");
        inverter_link::init_logging("debug");
    });
}

/// What the mock device does after reading a request.
#[derive(Clone, Debug)]
pub enum Reply {
    Bytes(Vec<u8>),
    /// Holds the connection open without answering.
    Silent,
}

#[derive(Clone, Debug)]
pub struct Exchange {
    pub request: Vec<u8>,
    pub reply: Reply,
}

impl Exchange {
    pub fn new(request: Vec<u8>, reply: Vec<u8>) -> Self {
        Self {
            request,
            reply: Reply::Bytes(reply),
        }
    }

    pub fn silent(request: Vec<u8>) -> Self {
        Self {
            request,
            reply: Reply::Silent,
        }
    }
}

/// A device on 127.0.0.1 serving scripted exchanges, one connection each,
/// in order. Mismatched requests end the script with an error.
pub struct MockDevice {
    addr: SocketAddr,
    handle: JoinHandle<Result<(), String>>,
}

impl MockDevice {
    pub async fn start(exchanges: Vec<Exchange>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            for (i, exchange) in exchanges.into_iter().enumerate() {
                let (mut stream, _) = listener
                    .accept()
                    .await
                    .map_err(|e| format!("exchange {}: accept failed: {}", i, e))?;

                let mut request = vec![0u8; exchange.request.len()];
                stream
                    .read_exact(&mut request)
                    .await
                    .map_err(|e| format!("exchange {}: read failed: {}", i, e))?;
                if request != exchange.request {
                    return Err(format!(
                        "exchange {}: expected {:02X?}, got {:02X?}",
                        i, exchange.request, request
                    ));
                }

                match exchange.reply {
                    Reply::Bytes(reply) => {
                        stream
                            .write_all(&reply)
                            .await
                            .map_err(|e| format!("exchange {}: write failed: {}", i, e))?;
                        let _ = stream.flush().await;
                    }
                    Reply::Silent => {
                        // the client gives up first
                        let mut sink = Vec::new();
                        let _ = stream.read_to_end(&mut sink).await;
                    }
                }
            }
            Ok(())
        });

        Self { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn tcp_endpoint(&self) -> String {
        format!("tcp://127.0.0.1:{}", self.port())
    }

    pub fn modbus_endpoint(&self) -> String {
        format!("modbus://127.0.0.1:{}", self.port())
    }

    /// Waits for the script to finish and panics on any mismatch.
    pub async fn finish(self) {
        match self.handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => panic!("mock device: {}", e),
            Err(e) => panic!("mock device task: {}", e),
        }
    }
}

pub struct Factory;

impl Factory {
    /// An ASCII response frame: `(`text, CRC, CR. CRC bytes that collide with
    /// framing characters are bumped by one, the way the inverters do it.
    pub fn ascii_reply(text: &str) -> Vec<u8> {
        let mut payload = format!("({}", text).into_bytes();
        let trailer = crc::voltronic_bytes(&payload).map(|b| match b {
            0x28 | 0x0D | 0x0A => b + 1,
            b => b,
        });
        payload.extend_from_slice(&trailer);
        payload.push(0x0D);
        payload
    }

    /// A read-holding response carrying `values`.
    pub fn read_reply(unit: u8, values: &[u16]) -> Vec<u8> {
        let mut reply = vec![unit, frame::READ_HOLDING, (values.len() * 2) as u8];
        for v in values {
            reply.extend_from_slice(&v.to_be_bytes());
        }
        let trailer = crc::modbus_bytes(&reply);
        reply.extend_from_slice(&trailer);
        reply
    }

    /// An exception response for `function`.
    pub fn exception_reply(unit: u8, function: u8, code: u8) -> Vec<u8> {
        let mut reply = vec![unit, function | 0x80, code];
        let trailer = crc::modbus_bytes(&reply);
        reply.extend_from_slice(&trailer);
        reply
    }

    /// The 8 byte acknowledgement of a write: the request's own first six
    /// bytes re-signed.
    pub fn write_reply(request: &[u8]) -> Vec<u8> {
        let mut reply = request[..6].to_vec();
        let trailer = crc::modbus_bytes(&reply);
        reply.extend_from_slice(&trailer);
        reply
    }

    pub fn config(endpoint: &str, extra: &str) -> Config {
        let yaml = format!(
            "queue_min_delay_ms: 10\npoll_interval_ms: 60000\ninverters:\n  - name: main\n    endpoint: \"{}\"\n    timeout_ms: 500\n{}",
            endpoint, extra
        );
        Config::from_yaml(&yaml).unwrap()
    }
}
