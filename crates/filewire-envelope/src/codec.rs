use bytes::{BufMut, BytesMut};

use crate::error::{EnvelopeError, Result};
use crate::order::ByteOrder;

/// Begin sentinel, first byte of every envelope.
pub const BEGIN_FLAG: u8 = 0xBF;

/// End sentinel, last byte of every envelope.
pub const END_FLAG: u8 = 0xEF;

/// Envelope header: begin sentinel (1) + payload length (4) = 5 bytes.
pub const HEADER_SIZE: usize = 5;

/// Envelope trailer: checksum (2) + end sentinel (1) = 3 bytes.
pub const TRAILER_SIZE: usize = 3;

/// Smallest possible envelope (empty payload).
pub const MIN_ENVELOPE_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Treatment of the 2-byte checksum field.
///
/// The field is always present on the wire. Peers interoperating with
/// implementations that never compute it must use `Reserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Write zero, ignore on decode. The default.
    #[default]
    Reserved,
    /// CRC-16/CCITT-FALSE over the payload, enforced on decode.
    Crc16,
}

/// Decoded envelope header fields.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeHeader {
    /// The begin sentinel as read from the wire.
    pub begin: u8,
    /// Payload length declared by the sender.
    pub payload_len: u32,
}

/// Configuration for the envelope codec, fixed per connection.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Byte order for all multi-byte integer fields.
    pub byte_order: ByteOrder,
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Checksum field treatment.
    pub checksum: ChecksumMode,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            checksum: ChecksumMode::default(),
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Encode one payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬────────────┬──────────────────┬───────────┬──────────┐
/// │ Begin    │ Length     │ Payload          │ Checksum  │ End      │
/// │ 0xBF (1B)│ (4B)       │ (Length bytes)   │ (2B)      │ 0xEF (1B)│
/// └──────────┴────────────┴──────────────────┴───────────┴──────────┘
/// ```
/// Multi-byte fields use the configured byte order.
pub fn encode_envelope(payload: &[u8], dst: &mut BytesMut, config: &EnvelopeConfig) -> Result<()> {
    let max = config.max_payload_size.min(u32::MAX as usize);
    if payload.len() > max {
        return Err(EnvelopeError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    dst.reserve(MIN_ENVELOPE_SIZE + payload.len());
    dst.put_u8(BEGIN_FLAG);
    dst.put_slice(&config.byte_order.write_u32(payload.len() as u32));
    dst.put_slice(payload);
    let checksum = match config.checksum {
        ChecksumMode::Reserved => 0,
        ChecksumMode::Crc16 => crc16(payload),
    };
    dst.put_slice(&config.byte_order.write_u16(checksum));
    dst.put_u8(END_FLAG);
    Ok(())
}

/// Decode the first [`HEADER_SIZE`] bytes of an envelope.
///
/// The caller must supply at least [`HEADER_SIZE`] bytes.
pub fn decode_header(src: &[u8], config: &EnvelopeConfig) -> Result<EnvelopeHeader> {
    let begin = src[0];
    if begin != BEGIN_FLAG {
        return Err(EnvelopeError::MalformedHeader { found: begin });
    }

    let payload_len = config.byte_order.read_u32(src[1..5].try_into().unwrap());
    if payload_len as usize > config.max_payload_size {
        return Err(EnvelopeError::PayloadTooLarge {
            size: payload_len as usize,
            max: config.max_payload_size,
        });
    }

    Ok(EnvelopeHeader { begin, payload_len })
}

/// Decode the [`TRAILER_SIZE`] bytes following the payload.
///
/// Validates the end sentinel and, in [`ChecksumMode::Crc16`], the payload
/// checksum. Returns the checksum as read from the wire.
pub fn decode_trailer(trailer: &[u8], payload: &[u8], config: &EnvelopeConfig) -> Result<u16> {
    let checksum = config.byte_order.read_u16(trailer[0..2].try_into().unwrap());
    let end = trailer[2];
    if end != END_FLAG {
        return Err(EnvelopeError::MalformedTrailer { found: end });
    }

    if config.checksum == ChecksumMode::Crc16 {
        let expected = crc16(payload);
        if checksum != expected {
            return Err(EnvelopeError::ChecksumMismatch {
                expected,
                found: checksum,
            });
        }
    }

    Ok(checksum)
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_exact_bytes_big_endian() {
        // A 6-byte payload: operation 1, method 1, correlation id 100.
        let payload = [0x01, 0x01, 0x00, 0x00, 0x00, 0x64];
        let config = EnvelopeConfig {
            byte_order: ByteOrder::Big,
            ..EnvelopeConfig::default()
        };

        let mut buf = BytesMut::new();
        encode_envelope(&payload, &mut buf, &config).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[
                0xBF, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00,
                0xEF
            ]
        );
    }

    #[test]
    fn encode_exact_bytes_little_endian() {
        let payload = [0xAA, 0xBB];
        let config = EnvelopeConfig {
            byte_order: ByteOrder::Little,
            ..EnvelopeConfig::default()
        };

        let mut buf = BytesMut::new();
        encode_envelope(&payload, &mut buf, &config).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[0xBF, 0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0x00, 0x00, 0xEF]
        );
    }

    #[test]
    fn header_decode_accepts_sentinel() {
        let config = EnvelopeConfig::default();
        let header = decode_header(&[0xBF, 0x00, 0x00, 0x01, 0x00], &config).unwrap();
        assert_eq!(header.begin, BEGIN_FLAG);
        assert_eq!(header.payload_len, 256);
    }

    #[test]
    fn header_decode_rejects_bad_sentinel() {
        let config = EnvelopeConfig::default();
        let err = decode_header(&[0x00, 0x00, 0x00, 0x00, 0x01], &config).unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::MalformedHeader { found: 0x00 }
        ));
    }

    #[test]
    fn header_decode_rejects_oversized_declaration() {
        let config = EnvelopeConfig {
            max_payload_size: 16,
            ..EnvelopeConfig::default()
        };
        let err = decode_header(&[0xBF, 0x00, 0x00, 0x00, 0x11], &config).unwrap_err();
        assert!(matches!(err, EnvelopeError::PayloadTooLarge { .. }));
    }

    #[test]
    fn trailer_decode_rejects_bad_sentinel() {
        let config = EnvelopeConfig::default();
        let err = decode_trailer(&[0x00, 0x00, 0xAB], b"payload", &config).unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::MalformedTrailer { found: 0xAB }
        ));
    }

    #[test]
    fn trailer_decode_ignores_checksum_in_reserved_mode() {
        let config = EnvelopeConfig::default();
        let checksum = decode_trailer(&[0x12, 0x34, 0xEF], b"payload", &config).unwrap();
        assert_eq!(checksum, 0x1234);
    }

    #[test]
    fn trailer_decode_enforces_crc16() {
        let config = EnvelopeConfig {
            checksum: ChecksumMode::Crc16,
            ..EnvelopeConfig::default()
        };
        let payload = b"123456789";
        let good = config.byte_order.write_u16(crc16(payload));

        let checksum = decode_trailer(&[good[0], good[1], 0xEF], payload, &config).unwrap();
        assert_eq!(checksum, crc16(payload));

        let err = decode_trailer(&[0x00, 0x00, 0xEF], payload, &config).unwrap_err();
        assert!(matches!(err, EnvelopeError::ChecksumMismatch { .. }));
    }

    #[test]
    fn crc16_known_vector() {
        // CRC-16/CCITT-FALSE check value for "123456789".
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn crc16_roundtrips_through_encode() {
        let config = EnvelopeConfig {
            checksum: ChecksumMode::Crc16,
            ..EnvelopeConfig::default()
        };
        let payload = b"integrity matters";

        let mut buf = BytesMut::new();
        encode_envelope(payload, &mut buf, &config).unwrap();

        let trailer = &buf[HEADER_SIZE + payload.len()..];
        assert_eq!(decode_trailer(trailer, payload, &config).unwrap(), crc16(payload));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let config = EnvelopeConfig {
            max_payload_size: 4,
            ..EnvelopeConfig::default()
        };
        let mut buf = BytesMut::new();
        let err = encode_envelope(b"too large", &mut buf, &config).unwrap_err();
        assert!(matches!(err, EnvelopeError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload_is_minimum_envelope() {
        let config = EnvelopeConfig::default();
        let mut buf = BytesMut::new();
        encode_envelope(b"", &mut buf, &config).unwrap();
        assert_eq!(buf.len(), MIN_ENVELOPE_SIZE);
        assert_eq!(buf[0], BEGIN_FLAG);
        assert_eq!(buf[MIN_ENVELOPE_SIZE - 1], END_FLAG);
    }
}
