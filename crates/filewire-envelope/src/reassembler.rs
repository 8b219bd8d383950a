use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{
    decode_header, decode_trailer, EnvelopeConfig, HEADER_SIZE, MIN_ENVELOPE_SIZE, TRAILER_SIZE,
};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Turns an arbitrarily-chunked byte stream into complete payloads.
///
/// Owns the partial-frame state of exactly one connection: the accumulated
/// buffer and, once parsed, the declared length of the frame in progress.
/// Feed bytes with [`push`](Reassembler::push), then drain with
/// [`next_payload`](Reassembler::next_payload) until it returns `Ok(None)`.
///
/// Payloads are emitted strictly in arrival order and only after the full
/// envelope has been received and validated. A malformed sentinel is fatal:
/// the declared length can no longer be trusted, so no resynchronization is
/// attempted.
pub struct Reassembler {
    config: EnvelopeConfig,
    buf: BytesMut,
    declared_len: Option<u32>,
}

impl Reassembler {
    /// Create a reassembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(EnvelopeConfig::default())
    }

    /// Create a reassembler with explicit configuration.
    pub fn with_config(config: EnvelopeConfig) -> Self {
        Self {
            config,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            declared_len: None,
        }
    }

    /// Append newly received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Attempt to extract the next complete payload.
    ///
    /// Returns `Ok(None)` when the buffered bytes do not yet form a complete
    /// envelope; this is the normal partial-delivery condition, not an error.
    pub fn next_payload(&mut self) -> Result<Option<Bytes>> {
        let declared = match self.declared_len {
            Some(len) => len,
            None => {
                if self.buf.len() < MIN_ENVELOPE_SIZE {
                    return Ok(None);
                }
                let header = decode_header(&self.buf, &self.config)?;
                self.buf.advance(HEADER_SIZE);
                self.declared_len = Some(header.payload_len);
                header.payload_len
            }
        };

        let declared = declared as usize;
        if self.buf.len() < declared + TRAILER_SIZE {
            return Ok(None);
        }

        let payload = self.buf.split_to(declared).freeze();
        let trailer = self.buf.split_to(TRAILER_SIZE);
        decode_trailer(&trailer, &payload, &self.config)?;

        self.declared_len = None;
        Ok(Some(payload))
    }

    /// Bytes buffered but not yet emitted.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True while a frame is partially received.
    pub fn mid_frame(&self) -> bool {
        self.declared_len.is_some() || !self.buf.is_empty()
    }

    /// Drop all partial-frame state, as on connection close.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.declared_len = None;
    }

    /// Current configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_envelope;
    use crate::error::EnvelopeError;
    use crate::order::ByteOrder;

    fn big_endian() -> EnvelopeConfig {
        EnvelopeConfig {
            byte_order: ByteOrder::Big,
            ..EnvelopeConfig::default()
        }
    }

    fn wire(payloads: &[&[u8]], config: &EnvelopeConfig) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_envelope(payload, &mut buf, config).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn whole_envelope_in_one_chunk() {
        let config = big_endian();
        let mut reassembler = Reassembler::with_config(config.clone());

        reassembler.push(&wire(&[b"hello"], &config));

        let payload = reassembler.next_payload().unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"hello");
        assert!(reassembler.next_payload().unwrap().is_none());
        assert!(!reassembler.mid_frame());
    }

    #[test]
    fn split_six_then_eight_emits_exactly_one_payload() {
        // The 14-byte request envelope split into chunks of 6 and 8.
        let bytes = [
            0xBF, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0xEF,
        ];
        let mut reassembler = Reassembler::with_config(big_endian());

        reassembler.push(&bytes[..6]);
        assert!(reassembler.next_payload().unwrap().is_none());

        reassembler.push(&bytes[6..]);
        let payload = reassembler.next_payload().unwrap().unwrap();
        assert_eq!(payload.as_ref(), &[0x01, 0x01, 0x00, 0x00, 0x00, 0x64]);
        assert!(reassembler.next_payload().unwrap().is_none());
    }

    #[test]
    fn byte_by_byte_delivery_preserves_order() {
        let config = big_endian();
        let stream = wire(&[b"first", b"second", b"third"], &config);
        let mut reassembler = Reassembler::with_config(config);

        let mut emitted = Vec::new();
        for byte in stream {
            reassembler.push(&[byte]);
            while let Some(payload) = reassembler.next_payload().unwrap() {
                emitted.push(payload);
            }
        }

        let emitted: Vec<&[u8]> = emitted.iter().map(|p| p.as_ref()).collect();
        assert_eq!(emitted, vec![&b"first"[..], &b"second"[..], &b"third"[..]]);
    }

    #[test]
    fn multiple_envelopes_in_single_chunk() {
        let config = big_endian();
        let mut reassembler = Reassembler::with_config(config.clone());

        reassembler.push(&wire(&[b"one", b"two"], &config));

        assert_eq!(
            reassembler.next_payload().unwrap().unwrap().as_ref(),
            b"one"
        );
        assert_eq!(
            reassembler.next_payload().unwrap().unwrap().as_ref(),
            b"two"
        );
        assert!(reassembler.next_payload().unwrap().is_none());
    }

    #[test]
    fn header_state_survives_across_pushes() {
        let config = big_endian();
        let stream = wire(&[b"0123456789"], &config);
        let mut reassembler = Reassembler::with_config(config);

        // Header plus three payload bytes; the declared length must be
        // remembered while the rest trickles in.
        reassembler.push(&stream[..8]);
        assert!(reassembler.next_payload().unwrap().is_none());
        assert!(reassembler.mid_frame());

        reassembler.push(&stream[8..]);
        let payload = reassembler.next_payload().unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"0123456789");
    }

    #[test]
    fn corrupted_begin_sentinel_is_fatal() {
        let config = big_endian();
        let mut stream = wire(&[b"payload"], &config);
        stream[0] = 0x00;

        let mut reassembler = Reassembler::with_config(config);
        reassembler.push(&stream);

        let err = reassembler.next_payload().unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedHeader { found: 0x00 }));
    }

    #[test]
    fn corrupted_end_sentinel_is_fatal() {
        let config = big_endian();
        let mut stream = wire(&[b"payload"], &config);
        let last = stream.len() - 1;
        stream[last] = 0x00;

        let mut reassembler = Reassembler::with_config(config);
        reassembler.push(&stream);

        let err = reassembler.next_payload().unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedTrailer { found: 0x00 }));
    }

    #[test]
    fn little_endian_stream_roundtrips() {
        let config = EnvelopeConfig {
            byte_order: ByteOrder::Little,
            ..EnvelopeConfig::default()
        };
        let stream = wire(&[b"payload bytes"], &config);
        let mut reassembler = Reassembler::with_config(config);

        reassembler.push(&stream);
        let payload = reassembler.next_payload().unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"payload bytes");
    }

    #[test]
    fn empty_payload_envelope() {
        let config = big_endian();
        let mut reassembler = Reassembler::with_config(config.clone());

        reassembler.push(&wire(&[b""], &config));
        let payload = reassembler.next_payload().unwrap().unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn reset_discards_partial_frame() {
        let config = big_endian();
        let stream = wire(&[b"interrupted"], &config);
        let mut reassembler = Reassembler::with_config(config.clone());

        reassembler.push(&stream[..9]);
        assert!(reassembler.mid_frame());

        reassembler.reset();
        assert!(!reassembler.mid_frame());
        assert_eq!(reassembler.buffered(), 0);

        // A fresh, complete envelope parses normally after reset.
        reassembler.push(&wire(&[b"fresh"], &config));
        let payload = reassembler.next_payload().unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"fresh");
    }
}
