//! Framing for the Voltronic ASCII protocol.
//!
//! Requests are `ASCII(command) + CRC16 + CR`. Responses are accumulated until
//! the first terminator byte; everything before it is the frame.

use crate::crc;
use crate::decoded::Decoded;
use crate::voltronic::command::Command;

use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

pub const CR: u8 = 0x0D;
pub const LF: u8 = 0x0A;

/// Bytes the firmware bumps by one when they show up in a response CRC, so the
/// trailer cannot be confused with framing.
const RESERVED_CRC_BYTES: [u8; 3] = [0x28, CR, LF];

/// Which bytes end a response frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminator {
    CarriageReturn,
    /// Elfin-style bridges sometimes end lines with LF only.
    CarriageReturnOrLineFeed,
}

impl Terminator {
    fn matches(&self, b: u8) -> bool {
        match self {
            Self::CarriageReturn => b == CR,
            Self::CarriageReturnOrLineFeed => b == CR || b == LF,
        }
    }
}

/// Frames `command` as it goes on the wire.
pub fn encode(command: &str) -> Vec<u8> {
    let bytes = command.trim().as_bytes();
    let mut packet = Vec::with_capacity(bytes.len() + 3);
    packet.extend_from_slice(bytes);
    packet.extend_from_slice(&crc::voltronic_bytes(bytes));
    packet.push(CR);
    packet
}

/// Wire packet for `command`, taken from the precomputed table when known.
pub fn packet_for(command: &str) -> Vec<u8> {
    match Command::from_name(command).wire_bytes() {
        Some(wire) => wire.to_vec(),
        None => encode(command),
    }
}

/// Per-request accumulator and packet writer. A fresh codec is created for every
/// connection so no bytes ever leak from one exchange into the next.
#[derive(Debug)]
pub struct VoltronicCodec {
    terminator: Terminator,
}

impl VoltronicCodec {
    pub fn new(terminator: Terminator) -> Self {
        Self { terminator }
    }
}

impl Decoder for VoltronicCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| self.terminator.matches(*b)) {
            Some(idx) => {
                let mut frame = src.split_to(idx + 1);
                frame.truncate(idx);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    // A partial frame at EOF stays in the buffer so the caller can report its size.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode(src)
    }
}

impl Encoder<String> for VoltronicCodec {
    type Error = io::Error;

    fn encode(&mut self, command: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let packet = packet_for(&command);
        dst.reserve(packet.len());
        dst.put_slice(&packet);
        Ok(())
    }
}

fn trailer_matches(payload: &[u8], trailer: [u8; 2]) -> bool {
    let expected = crc::voltronic_bytes(payload);
    if expected == trailer {
        return true;
    }

    let bump = |b: u8| {
        if RESERVED_CRC_BYTES.contains(&b) {
            b + 1
        } else {
            b
        }
    };
    [bump(expected[0]), bump(expected[1])] == trailer
}

/// Turns a raw frame (terminator already removed) into text.
///
/// A valid CRC trailer is stripped. Frames without one are kept whole; any byte
/// outside ASCII is dropped rather than failing the frame.
pub fn response_text(frame: &[u8]) -> String {
    let n = frame.len();
    let payload = if n >= 3 && trailer_matches(&frame[..n - 2], [frame[n - 2], frame[n - 1]]) {
        &frame[..n - 2]
    } else {
        frame
    };

    let text: String = payload
        .iter()
        .filter(|b| b.is_ascii())
        .map(|b| *b as char)
        .collect();
    text.trim().to_string()
}

/// Interprets the reply to a setting command.
pub fn write_status(text: &str) -> Decoded {
    let text = text.trim();
    if text.contains("ACK") {
        Decoded::status("ACK")
    } else if text.contains("NAK") {
        Decoded::status("NAK")
    } else if text.is_empty() {
        Decoded::error("empty response")
    } else {
        Decoded::new().with("raw", text)
    }
}
