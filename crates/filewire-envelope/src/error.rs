/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope does not start with the begin sentinel.
    #[error("malformed header (expected begin sentinel 0xBF, found {found:#04x})")]
    MalformedHeader { found: u8 },

    /// The envelope does not end with the end sentinel.
    #[error("malformed trailer (expected end sentinel 0xEF, found {found:#04x})")]
    MalformedTrailer { found: u8 },

    /// The payload checksum does not match (CRC16 mode only).
    #[error("checksum mismatch (expected {expected:#06x}, found {found:#06x})")]
    ChecksumMismatch { expected: u16, found: u16 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing envelopes.
    #[error("envelope I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete envelope was received.
    #[error("connection closed (incomplete envelope)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
