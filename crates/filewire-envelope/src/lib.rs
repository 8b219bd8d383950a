//! Sentinel-delimited envelope framing with configurable byte order.
//!
//! Every message on the wire is wrapped in an envelope:
//! - A 1-byte begin sentinel (`0xBF`) for stream sanity checking
//! - A 4-byte payload length in the configured byte order
//! - The payload itself
//! - A 2-byte checksum field (zero unless CRC16 mode is enabled)
//! - A 1-byte end sentinel (`0xEF`)
//!
//! No partial reads, no buffer management in user code. A corrupted sentinel
//! is never skipped over: the stream is considered unrecoverable and the
//! error propagates to the connection owner.

pub mod codec;
pub mod error;
pub mod order;
pub mod reader;
pub mod reassembler;
pub mod writer;

pub use codec::{
    crc16, decode_header, decode_trailer, encode_envelope, ChecksumMode, EnvelopeConfig,
    EnvelopeHeader, BEGIN_FLAG, DEFAULT_MAX_PAYLOAD, END_FLAG, HEADER_SIZE, MIN_ENVELOPE_SIZE,
    TRAILER_SIZE,
};
pub use error::{EnvelopeError, Result};
pub use order::ByteOrder;
pub use reader::EnvelopeReader;
pub use reassembler::Reassembler;
pub use writer::EnvelopeWriter;
