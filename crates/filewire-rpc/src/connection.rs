use std::io::{ErrorKind, Read};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use filewire_envelope::{ByteOrder, EnvelopeConfig, EnvelopeWriter, Reassembler};
use filewire_transport::TcpChannel;
use tracing::{debug, error, info, warn};

use crate::error::{Result, RpcError};
use crate::message::{encode_notification, encode_response, Message};
use crate::pending::{PendingTable, Token};
use crate::router::Router;

const READ_CHUNK_SIZE: usize = 8 * 1024;
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Events consumed by a connection actor.
///
/// Transport reads and pending-request resolutions arrive through the same
/// channel, which is what serializes all processing for one connection.
pub(crate) enum ConnEvent {
    Data(Vec<u8>),
    Eof,
    ReadFailed(std::io::Error),
    Resolve { token: Token, result: Vec<u8> },
    Discard { token: Token },
    Shutdown,
}

/// Handle used by external collaborators to answer a deferred request.
///
/// Cloneable and sendable across threads; the delivery itself is processed
/// on the connection's actor, never on the caller's thread.
#[derive(Clone)]
pub struct Resolver {
    events: mpsc::Sender<ConnEvent>,
}

impl Resolver {
    pub(crate) fn new(events: mpsc::Sender<ConnEvent>) -> Self {
        Self { events }
    }

    /// Deliver the result for a deferred request.
    ///
    /// Returns false when the owning connection is already gone; the token
    /// is consumed either way.
    pub fn resolve(&self, token: Token, result: Vec<u8>) -> bool {
        self.events.send(ConnEvent::Resolve { token, result }).is_ok()
    }

    /// Abandon a deferred request without sending a reply.
    pub fn discard(&self, token: Token) -> bool {
        self.events.send(ConnEvent::Discard { token }).is_ok()
    }
}

/// Outbound seam through which handlers emit envelopes.
///
/// Exists so handler code can be exercised against an in-memory sink in
/// tests; the production implementation is [`EnvelopeWriter`].
pub trait EnvelopeSink {
    fn send_payload(&mut self, payload: &[u8]) -> filewire_envelope::Result<()>;
}

impl<T: std::io::Write> EnvelopeSink for EnvelopeWriter<T> {
    fn send_payload(&mut self, payload: &[u8]) -> filewire_envelope::Result<()> {
        self.send(payload)
    }
}

/// Per-request view handed to request handlers.
///
/// Lets a handler answer synchronously, emit notifications, or defer the
/// answer by registering a pending entry and handing the [`Token`] plus a
/// [`Resolver`] to whatever will produce the result later.
pub struct RequestContext<'a> {
    sink: &'a mut dyn EnvelopeSink,
    pending: &'a PendingTable,
    resolver: Resolver,
    order: ByteOrder,
    method: u8,
}

impl<'a> RequestContext<'a> {
    pub fn new(
        sink: &'a mut dyn EnvelopeSink,
        pending: &'a PendingTable,
        resolver: Resolver,
        order: ByteOrder,
        method: u8,
    ) -> Self {
        Self {
            sink,
            pending,
            resolver,
            order,
            method,
        }
    }

    /// Method code of the request being handled.
    pub fn method(&self) -> u8 {
        self.method
    }

    /// Byte order of this connection.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Send a response to the request being handled.
    pub fn reply(&mut self, correlation_id: u32, arguments: &[u8]) -> Result<()> {
        let payload = encode_response(self.method, correlation_id, arguments, self.order);
        self.sink.send_payload(&payload)?;
        Ok(())
    }

    /// Send a notification on this connection.
    pub fn notify(&mut self, method: u8, arguments: &[u8]) -> Result<()> {
        let payload = encode_notification(method, arguments);
        self.sink.send_payload(&payload)?;
        Ok(())
    }

    /// Defer the answer: register a pending entry for this request.
    pub fn defer(&self, correlation_id: u32) -> Result<Token> {
        self.pending.register(correlation_id, self.method)
    }

    /// Handle for delivering the deferred result later, from any thread.
    pub fn resolver(&self) -> Resolver {
        self.resolver.clone()
    }
}

/// Per-connection lifecycle. `Streaming` is the only state in which frames
/// are processed; both terminal states release the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Accepted,
    Streaming,
    Violated,
    Closed,
}

/// Owner-side handle to a spawned connection.
pub struct ConnectionHandle {
    id: u64,
    events: mpsc::Sender<ConnEvent>,
    stream: TcpChannel,
}

impl ConnectionHandle {
    /// Service-assigned connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handle for delivering external results to this connection.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.events.clone())
    }

    /// Tear the connection down: wake the actor and shut the socket so the
    /// reader thread unblocks.
    pub fn close(&self) {
        let _ = self.events.send(ConnEvent::Shutdown);
        let _ = self.stream.shutdown();
    }
}

pub(crate) struct ConnectionSettings {
    pub envelope: EnvelopeConfig,
    pub pending_timeout: Option<Duration>,
}

/// Wire an accepted stream to a reader thread and an actor thread.
pub(crate) fn spawn(
    stream: TcpChannel,
    router: Arc<Router>,
    settings: ConnectionSettings,
    id: u64,
) -> Result<ConnectionHandle> {
    let peer = stream.peer_addr().ok();
    debug!(id, ?peer, "connection accepted");

    let (tx, rx) = mpsc::channel();

    let reader_stream = stream.try_clone()?;
    let writer_stream = stream.try_clone()?;
    let writer = EnvelopeWriter::with_config_tcp(writer_stream, settings.envelope.clone())?;

    let reader_tx = tx.clone();
    std::thread::Builder::new()
        .name(format!("filewire-conn-{id}-read"))
        .spawn(move || read_loop(reader_stream, reader_tx))
        .map_err(|e| RpcError::Transport(e.into()))?;

    let actor = ConnectionActor {
        id,
        rx,
        resolver_tx: tx.clone(),
        stream: stream.try_clone()?,
        writer,
        reassembler: Reassembler::with_config(settings.envelope.clone()),
        pending: PendingTable::new(),
        router,
        order: settings.envelope.byte_order,
        pending_timeout: settings.pending_timeout,
        state: ConnectionState::Accepted,
    };
    std::thread::Builder::new()
        .name(format!("filewire-conn-{id}"))
        .spawn(move || actor.run())
        .map_err(|e| RpcError::Transport(e.into()))?;

    Ok(ConnectionHandle {
        id,
        events: tx,
        stream,
    })
}

fn read_loop(mut stream: TcpChannel, tx: mpsc::Sender<ConnEvent>) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => {
                let _ = tx.send(ConnEvent::Eof);
                break;
            }
            Ok(n) => {
                if tx.send(ConnEvent::Data(chunk[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = tx.send(ConnEvent::ReadFailed(err));
                break;
            }
        }
    }
}

struct ConnectionActor {
    id: u64,
    rx: mpsc::Receiver<ConnEvent>,
    resolver_tx: mpsc::Sender<ConnEvent>,
    stream: TcpChannel,
    writer: EnvelopeWriter<TcpChannel>,
    reassembler: Reassembler,
    pending: PendingTable,
    router: Arc<Router>,
    order: ByteOrder,
    pending_timeout: Option<Duration>,
    state: ConnectionState,
}

impl ConnectionActor {
    fn run(mut self) {
        debug_assert_eq!(self.state, ConnectionState::Accepted);
        self.state = ConnectionState::Streaming;
        debug!(id = self.id, "connection streaming");

        loop {
            let event = match self.rx.recv_timeout(SWEEP_INTERVAL) {
                Ok(event) => Some(event),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            };

            match event {
                Some(ConnEvent::Data(chunk)) => {
                    if let Err(err) = self.ingest(&chunk) {
                        error!(id = self.id, error = %err, "protocol violation; closing connection");
                        self.state = ConnectionState::Violated;
                        break;
                    }
                }
                Some(ConnEvent::Resolve { token, result }) => {
                    let rid = token.correlation_id();
                    match self.resolve(token, &result) {
                        Ok(()) => {}
                        Err(RpcError::StaleToken(_)) => {
                            warn!(id = self.id, rid, "late resolution dropped, token no longer pending");
                        }
                        Err(err) => {
                            warn!(id = self.id, rid, error = %err, "failed writing resolved response");
                            break;
                        }
                    }
                }
                Some(ConnEvent::Discard { token }) => {
                    let rid = token.correlation_id();
                    match self.pending.take(token) {
                        Ok(_) => debug!(id = self.id, rid, "pending request discarded"),
                        Err(err) => warn!(id = self.id, rid, error = %err, "discard ignored"),
                    }
                }
                Some(ConnEvent::Eof) => {
                    info!(id = self.id, "peer closed connection");
                    break;
                }
                Some(ConnEvent::ReadFailed(err)) => {
                    warn!(id = self.id, error = %err, "transport read failed");
                    break;
                }
                Some(ConnEvent::Shutdown) => {
                    debug!(id = self.id, "connection shut down");
                    break;
                }
                None => {}
            }

            self.sweep_expired();
        }

        self.teardown();
    }

    /// Feed a chunk through the reassembler and dispatch every complete
    /// payload it yields.
    fn ingest(&mut self, chunk: &[u8]) -> Result<()> {
        self.reassembler.push(chunk);
        while let Some(payload) = self.reassembler.next_payload()? {
            if let Err(err) = self.process_payload(payload) {
                if err.is_connection_fatal() {
                    return Err(err);
                }
                warn!(id = self.id, error = %err, "handler signaled a non-fatal error");
            }
        }
        Ok(())
    }

    fn process_payload(&mut self, payload: Bytes) -> Result<()> {
        let message = Message::decode(payload, self.order)?;
        let mut ctx = RequestContext::new(
            &mut self.writer,
            &self.pending,
            Resolver::new(self.resolver_tx.clone()),
            self.order,
            message.method(),
        );
        self.router.dispatch(&mut ctx, &message)
    }

    fn resolve(&mut self, token: Token, result: &[u8]) -> Result<()> {
        let rid = token.correlation_id();
        let entry = self.pending.take(token)?;
        let payload = encode_response(entry.method, rid, result, self.order);
        self.writer.send(&payload)?;
        debug!(id = self.id, rid, method = entry.method, "pending request resolved");
        Ok(())
    }

    fn sweep_expired(&mut self) {
        if let Some(age) = self.pending_timeout {
            for (rid, entry) in self.pending.expire_older_than(age) {
                warn!(
                    id = self.id,
                    rid,
                    method = entry.method,
                    "pending request expired without resolution"
                );
            }
        }
    }

    fn teardown(&mut self) {
        if self.state != ConnectionState::Violated {
            self.state = ConnectionState::Closed;
        }
        let discarded = self.pending.discard_all();
        if discarded > 0 {
            warn!(id = self.id, discarded, "discarded pending requests on close");
        }
        let _ = self.stream.shutdown();
        debug!(id = self.id, state = ?self.state, "connection terminated");
    }
}
