use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use filewire_transport::TcpChannel;

use crate::codec::{encode_envelope, EnvelopeConfig};
use crate::error::{EnvelopeError, Result};
use crate::reader::transport_to_envelope_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete envelopes to any `Write` stream.
pub struct EnvelopeWriter<T> {
    inner: T,
    buf: BytesMut,
    config: EnvelopeConfig,
}

impl<T: Write> EnvelopeWriter<T> {
    /// Create a new envelope writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, EnvelopeConfig::default())
    }

    /// Create a new envelope writer with explicit configuration.
    pub fn with_config(inner: T, config: EnvelopeConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one payload (blocking).
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_envelope(payload, &mut self.buf, &self.config)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(EnvelopeError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EnvelopeError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(EnvelopeError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }
}

impl EnvelopeWriter<TcpChannel> {
    /// Create an envelope writer for [`TcpChannel`] and apply the write
    /// timeout from config.
    pub fn with_config_tcp(inner: TcpChannel, config: EnvelopeConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_envelope_error)?;
        Ok(Self::with_config(inner, config))
    }
}
