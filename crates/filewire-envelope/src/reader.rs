use std::io::{ErrorKind, Read};

use bytes::Bytes;
use filewire_transport::TcpChannel;

use crate::codec::EnvelopeConfig;
use crate::error::{EnvelopeError, Result};
use crate::reassembler::Reassembler;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete payloads from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete,
/// validated payloads.
pub struct EnvelopeReader<T> {
    inner: T,
    reassembler: Reassembler,
}

impl<T: Read> EnvelopeReader<T> {
    /// Create a new envelope reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, EnvelopeConfig::default())
    }

    /// Create a new envelope reader with explicit configuration.
    pub fn with_config(inner: T, config: EnvelopeConfig) -> Self {
        Self {
            inner,
            reassembler: Reassembler::with_config(config),
        }
    }

    /// Read the next complete payload (blocking).
    ///
    /// Returns `Err(EnvelopeError::ConnectionClosed)` when EOF is reached.
    pub fn read_payload(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = self.reassembler.next_payload()? {
                return Ok(payload);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(EnvelopeError::Io(err)),
            };

            if read == 0 {
                return Err(EnvelopeError::ConnectionClosed);
            }

            self.reassembler.push(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        self.reassembler.config()
    }
}

impl EnvelopeReader<TcpChannel> {
    /// Create an envelope reader for [`TcpChannel`] and apply the read
    /// timeout from config.
    pub fn with_config_tcp(inner: TcpChannel, config: EnvelopeConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_envelope_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_envelope_error(
    err: filewire_transport::TransportError,
) -> EnvelopeError {
    match err {
        filewire_transport::TransportError::Io(io)
        | filewire_transport::TransportError::Accept(io) => EnvelopeError::Io(io),
        filewire_transport::TransportError::Bind { source, .. }
        | filewire_transport::TransportError::Connect { source, .. } => EnvelopeError::Io(source),
    }
}
