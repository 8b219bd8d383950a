use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use filewire_envelope::{ByteOrder, EnvelopeConfig, EnvelopeError, EnvelopeReader, EnvelopeWriter};
use filewire_transport::TcpChannel;
use tracing::debug;

use crate::error::{Result, RpcError};
use crate::message::{encode_notification, encode_request, Message};

/// Client side of a filewire connection.
///
/// Issues requests with monotonically increasing correlation ids and
/// receives classified messages. One clone of the socket reads while the
/// other writes, so a blocked receive never blocks sends.
pub struct RpcClient {
    reader: EnvelopeReader<TcpChannel>,
    writer: EnvelopeWriter<TcpChannel>,
    order: ByteOrder,
    read_timeout: Option<Duration>,
    next_rid: u32,
}

impl RpcClient {
    /// Connect to a listening service.
    pub fn connect(addr: SocketAddr, config: EnvelopeConfig) -> Result<Self> {
        let stream = filewire_transport::connect(addr)?;
        let reader_stream = stream.try_clone()?;

        let reader = EnvelopeReader::with_config_tcp(reader_stream, config.clone())?;
        let writer = EnvelopeWriter::with_config_tcp(stream, config.clone())?;

        Ok(Self {
            reader,
            writer,
            order: config.byte_order,
            read_timeout: config.read_timeout,
            next_rid: 0,
        })
    }

    fn next_correlation_id(&mut self) -> u32 {
        self.next_rid = self.next_rid.wrapping_add(1);
        self.next_rid
    }

    /// Send a request; returns the correlation id assigned to it.
    pub fn request(&mut self, method: u8, arguments: &[u8]) -> Result<u32> {
        let correlation_id = self.next_correlation_id();
        let payload = encode_request(method, correlation_id, arguments, self.order);
        self.writer.send(&payload)?;
        Ok(correlation_id)
    }

    /// Send a fire-and-forget notification.
    pub fn notify(&mut self, method: u8, arguments: &[u8]) -> Result<()> {
        let payload = encode_notification(method, arguments);
        self.writer.send(&payload)?;
        Ok(())
    }

    /// Receive and classify the next message (blocking).
    pub fn recv(&mut self) -> Result<Message> {
        let payload = self
            .reader
            .read_payload()
            .map_err(|err| self.map_recv_error(err))?;
        Message::decode(payload, self.order)
    }

    /// Issue a request and block until its response arrives.
    ///
    /// Messages with other correlation ids received in the meantime are
    /// skipped; use [`recv`](RpcClient::recv) directly for full traffic.
    pub fn call(&mut self, method: u8, arguments: &[u8]) -> Result<Message> {
        let correlation_id = self.request(method, arguments)?;
        loop {
            let message = self.recv()?;
            let is_answer = matches!(
                &message,
                Message::Response { correlation_id: rid, .. } if *rid == correlation_id
            );
            if is_answer {
                return Ok(message);
            }
            debug!(
                correlation_id,
                "skipping non-matching message while awaiting response"
            );
        }
    }

    fn map_recv_error(&self, err: EnvelopeError) -> RpcError {
        if let EnvelopeError::Io(io) = &err {
            if let Some(timeout) = self.read_timeout {
                if matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) {
                    return RpcError::Timeout(timeout);
                }
            }
        }
        RpcError::Envelope(err)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("next_rid", &self.next_rid)
            .finish()
    }
}
