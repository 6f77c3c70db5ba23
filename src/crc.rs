//! The two CRC16 flavours spoken on the wire.
//!
//! Voltronic ASCII framing uses CRC-16/XMODEM (poly 0x1021, init 0) with a
//! big-endian trailer. Modbus RTU uses the reflected 0xA001 polynomial with
//! init 0xFFFF and a little-endian trailer. They are never interchangeable.

/// Voltronic CRC16 over `data`.
pub fn voltronic(data: &[u8]) -> u16 {
    crc16::State::<crc16::XMODEM>::calculate(data)
}

/// Trailer bytes as they appear after an ASCII command (high byte first).
pub fn voltronic_bytes(data: &[u8]) -> [u8; 2] {
    voltronic(data).to_be_bytes()
}

pub fn validate_voltronic(data: &[u8], crc: [u8; 2]) -> bool {
    voltronic_bytes(data) == crc
}

/// Modbus CRC16 over `data`.
pub fn modbus(data: &[u8]) -> u16 {
    crc16::State::<crc16::MODBUS>::calculate(data)
}

/// Trailer bytes as they appear at the end of an RTU frame (low byte first).
pub fn modbus_bytes(data: &[u8]) -> [u8; 2] {
    modbus(data).to_le_bytes()
}

pub fn validate_modbus(data: &[u8], crc: [u8; 2]) -> bool {
    modbus_bytes(data) == crc
}
