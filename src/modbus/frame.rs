//! Modbus RTU frames as carried over raw TCP (no MBAP header, CRC kept).

use crate::crc;
use crate::error::ExchangeError;

use nom::{multi::count, number::complete::be_u16, IResult};

pub const READ_HOLDING: u8 = 0x03;
pub const WRITE_SINGLE: u8 = 0x06;
pub const WRITE_MULTIPLE: u8 = 0x10;
const EXCEPTION_BIT: u8 = 0x80;

/// Length of a normal write response: unit, function, 4 bytes echo, CRC.
pub const WRITE_RESPONSE_LEN: usize = 8;
/// Bytes that follow the 2-byte header in an exception response: code + CRC.
pub const EXCEPTION_TAIL_LEN: usize = 3;

fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
    let trailer = crc::modbus_bytes(&frame);
    frame.extend_from_slice(&trailer);
    frame
}

pub fn read_request(unit: u8, address: u16, quantity: u16) -> Vec<u8> {
    let [ah, al] = address.to_be_bytes();
    let [qh, ql] = quantity.to_be_bytes();
    with_crc(vec![unit, READ_HOLDING, ah, al, qh, ql])
}

pub fn write_single_request(unit: u8, address: u16, value: u16) -> Vec<u8> {
    let [ah, al] = address.to_be_bytes();
    let [vh, vl] = value.to_be_bytes();
    with_crc(vec![unit, WRITE_SINGLE, ah, al, vh, vl])
}

/// Function 0x10 carrying exactly one register.
pub fn write_multiple_request(unit: u8, address: u16, value: u16) -> Vec<u8> {
    let [ah, al] = address.to_be_bytes();
    let [vh, vl] = value.to_be_bytes();
    with_crc(vec![unit, WRITE_MULTIPLE, ah, al, 0x00, 0x01, 0x02, vh, vl])
}

pub fn is_exception(function: u8) -> bool {
    function & EXCEPTION_BIT != 0
}

/// Builds the error for an exception response: `header` is unit + function,
/// `tail` is the exception code followed by the CRC.
pub fn exception(unit: u8, header: [u8; 2], tail: [u8; EXCEPTION_TAIL_LEN]) -> ExchangeError {
    let frame = [header[0], header[1], tail[0]];
    if let Err(e) = check_crc(&frame, [tail[1], tail[2]]) {
        return e;
    }
    if header[0] != unit {
        return ExchangeError::UnitMismatch {
            expected: unit,
            got: header[0],
        };
    }
    ExchangeError::Exception {
        function: header[1] & !EXCEPTION_BIT,
        code: tail[0],
    }
}

fn check_crc(data: &[u8], trailer: [u8; 2]) -> Result<(), ExchangeError> {
    if crc::validate_modbus(data, trailer) {
        Ok(())
    } else {
        Err(ExchangeError::Crc {
            expected: crc::modbus_bytes(data),
            got: trailer,
        })
    }
}

fn registers(input: &[u8], n: usize) -> IResult<&[u8], Vec<u16>> {
    count(be_u16, n)(input)
}

/// Decodes the registers of a read response.
///
/// `header` is unit + function, `byte_count` the third byte and `rest` the
/// `byte_count` data bytes followed by the CRC. Never returns more than
/// `quantity` registers, and fewer if the device sent fewer.
pub fn parse_read_response(
    unit: u8,
    header: [u8; 2],
    byte_count: u8,
    rest: &[u8],
    quantity: u16,
) -> Result<Vec<u16>, ExchangeError> {
    if byte_count % 2 != 0 {
        return Err(ExchangeError::OddByteCount(byte_count));
    }
    let data_len = byte_count as usize;
    if rest.len() < data_len + 2 {
        return Err(ExchangeError::ShortResponse(3 + rest.len()));
    }

    let (data, trailer) = rest.split_at(data_len);
    let mut frame = Vec::with_capacity(3 + data_len);
    frame.extend_from_slice(&header);
    frame.push(byte_count);
    frame.extend_from_slice(data);
    check_crc(&frame, [trailer[0], trailer[1]])?;

    if header[0] != unit {
        return Err(ExchangeError::UnitMismatch {
            expected: unit,
            got: header[0],
        });
    }
    if header[1] != READ_HOLDING {
        return Err(ExchangeError::FunctionMismatch {
            expected: READ_HOLDING,
            got: header[1],
        });
    }

    let n = data_len.min(quantity as usize * 2) / 2;
    let (_, values) =
        registers(data, n).map_err(|_| ExchangeError::ShortResponse(3 + data_len))?;
    Ok(values)
}

/// Validates the echo a device sends after a successful write. An exception
/// response in the first five bytes is decoded into its code.
pub fn parse_write_response(
    unit: u8,
    function: u8,
    frame: &[u8; WRITE_RESPONSE_LEN],
) -> Result<(), ExchangeError> {
    if is_exception(frame[1]) {
        return Err(exception(unit, [frame[0], frame[1]], [frame[2], frame[3], frame[4]]));
    }

    check_crc(&frame[..6], [frame[6], frame[7]])?;

    if frame[0] != unit {
        return Err(ExchangeError::UnitMismatch {
            expected: unit,
            got: frame[0],
        });
    }
    if frame[1] != function {
        return Err(ExchangeError::FunctionMismatch {
            expected: function,
            got: frame[1],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(unit: u8, data: &[u8]) -> ([u8; 2], u8, Vec<u8>) {
        let mut frame = vec![unit, READ_HOLDING, data.len() as u8];
        frame.extend_from_slice(data);
        let trailer = crc::modbus_bytes(&frame);
        let mut rest = data.to_vec();
        rest.extend_from_slice(&trailer);
        ([unit, READ_HOLDING], data.len() as u8, rest)
    }

    #[test]
    fn read_request_layout() {
        assert_eq!(
            read_request(1, 0, 1),
            vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]
        );
        let r = read_request(1, 201, 31);
        assert_eq!(&r[..6], &[0x01, 0x03, 0x00, 0xC9, 0x00, 0x1F]);
    }

    #[test]
    fn write_request_layouts() {
        let single = write_single_request(1, 301, 2);
        assert_eq!(&single[..6], &[0x01, 0x06, 0x01, 0x2D, 0x00, 0x02]);
        assert_eq!(single.len(), 8);

        let multiple = write_multiple_request(1, 301, 2);
        assert_eq!(
            &multiple[..9],
            &[0x01, 0x10, 0x01, 0x2D, 0x00, 0x01, 0x02, 0x00, 0x02]
        );
        assert_eq!(multiple.len(), 11);
    }

    #[test]
    fn parses_registers() {
        let (header, bc, rest) = response(1, &[0x0A, 0x5A, 0xFE, 0xA2]);
        assert_eq!(
            parse_read_response(1, header, bc, &rest, 2).unwrap(),
            vec![2650, 65186]
        );
    }

    #[test]
    fn returns_at_most_quantity() {
        let (header, bc, rest) = response(1, &[0, 1, 0, 2, 0, 3]);
        assert_eq!(parse_read_response(1, header, bc, &rest, 2).unwrap(), vec![1, 2]);
        assert_eq!(parse_read_response(1, header, bc, &rest, 10).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn rejects_bad_frames() {
        let (header, bc, mut rest) = response(2, &[0, 1]);
        assert_eq!(
            parse_read_response(1, header, bc, &rest, 1),
            Err(ExchangeError::UnitMismatch { expected: 1, got: 2 })
        );

        rest[0] ^= 0xFF;
        assert!(matches!(
            parse_read_response(2, header, bc, &rest, 1),
            Err(ExchangeError::Crc { .. })
        ));

        assert_eq!(
            parse_read_response(1, [1, 3], 3, &[0, 0, 0, 0, 0], 1),
            Err(ExchangeError::OddByteCount(3))
        );
    }

    #[test]
    fn exception_response() {
        let frame = [0x01, 0x86, 0x02];
        let trailer = crc::modbus_bytes(&frame);
        assert_eq!(
            exception(1, [0x01, 0x86], [0x02, trailer[0], trailer[1]]),
            ExchangeError::Exception {
                function: WRITE_SINGLE,
                code: 2
            }
        );
        assert!(is_exception(0x83));
        assert!(!is_exception(0x03));
    }

    #[test]
    fn write_echo() {
        let mut echo = [0u8; WRITE_RESPONSE_LEN];
        echo.copy_from_slice(&write_single_request(1, 301, 2));
        assert_eq!(parse_write_response(1, WRITE_SINGLE, &echo), Ok(()));
        assert_eq!(
            parse_write_response(1, WRITE_MULTIPLE, &echo),
            Err(ExchangeError::FunctionMismatch {
                expected: WRITE_MULTIPLE,
                got: WRITE_SINGLE
            })
        );
    }

    #[test]
    fn write_exception_names_its_code() {
        let mut frame = [0u8; WRITE_RESPONSE_LEN];
        let body = [0x01, WRITE_SINGLE | 0x80, 0x03];
        let trailer = crc::modbus_bytes(&body);
        frame[..3].copy_from_slice(&body);
        frame[3..5].copy_from_slice(&trailer);

        let err = parse_write_response(1, WRITE_SINGLE, &frame).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Exception {
                function: WRITE_SINGLE,
                code: 3
            }
        );
        assert!(err.to_string().contains("modbus exception 0x03"));
    }
}
