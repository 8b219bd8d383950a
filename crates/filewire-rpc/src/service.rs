use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use filewire_envelope::{ByteOrder, ChecksumMode, EnvelopeConfig, DEFAULT_MAX_PAYLOAD};
use filewire_transport::TcpAcceptor;
use tracing::info;

use crate::connection::{self, ConnectionHandle, ConnectionSettings, Resolver};
use crate::error::Result;
use crate::router::{Router, RouterCatalog};

/// Default service port, kept from the original deployment.
pub const DEFAULT_PORT: u16 = 42678;

/// Bootstrap parameters for one service instance.
///
/// Byte order and router selection are explicit fields here rather than
/// process-wide state; two services in one process can disagree on both.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to bind.
    pub bind_addr: IpAddr,
    /// Port to bind. Port 0 picks an ephemeral port.
    pub port: u16,
    /// Byte order for all multi-byte wire fields.
    pub byte_order: ByteOrder,
    /// Maximum accepted payload size.
    pub max_payload_size: usize,
    /// Checksum field treatment.
    pub checksum: ChecksumMode,
    /// Bound on how long a deferred request may stay unresolved. `None`
    /// keeps entries until resolution or connection close.
    pub pending_timeout: Option<Duration>,
    /// Router name resolved through the [`RouterCatalog`] at bind time.
    pub router: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            byte_order: ByteOrder::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            checksum: ChecksumMode::default(),
            pending_timeout: None,
            router: "default".to_string(),
        }
    }
}

impl ServiceConfig {
    /// The socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Envelope configuration derived from this service configuration.
    pub fn envelope_config(&self) -> EnvelopeConfig {
        EnvelopeConfig {
            byte_order: self.byte_order,
            max_payload_size: self.max_payload_size,
            checksum: self.checksum,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Accepts connections and enforces the single-active-connection policy.
///
/// Accepting a new connection closes and discards any previously accepted
/// one before wiring the new connection to fresh per-connection state. The
/// router is shared read-only across connections; everything else is owned
/// by the connection's actor.
pub struct RpcService {
    acceptor: TcpAcceptor,
    router: Arc<Router>,
    config: ServiceConfig,
    active: Option<ConnectionHandle>,
    next_conn_id: u64,
}

impl RpcService {
    /// Bind, resolving the configured router name through `catalog`.
    pub fn bind(config: ServiceConfig, catalog: &RouterCatalog) -> Result<Self> {
        let router = catalog.build(&config.router)?;
        Self::bind_with_router(config, router)
    }

    /// Bind with an explicitly constructed router.
    pub fn bind_with_router(config: ServiceConfig, router: Router) -> Result<Self> {
        let acceptor = TcpAcceptor::bind(config.socket_addr())?;
        Ok(Self {
            acceptor,
            router: Arc::new(router),
            config,
            active: None,
            next_conn_id: 1,
        })
    }

    /// The bound address, with any ephemeral port resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }

    /// Resolver for the currently active connection, if any.
    ///
    /// This is how a host delivers externally produced results when it does
    /// not hold a resolver from the originating handler.
    pub fn active_resolver(&self) -> Option<Resolver> {
        self.active.as_ref().map(ConnectionHandle::resolver)
    }

    /// Accept one connection, replacing the active one.
    pub fn accept_next(&mut self) -> Result<()> {
        let stream = self.acceptor.accept()?;

        if let Some(previous) = self.active.take() {
            info!(id = previous.id(), "replacing active connection");
            previous.close();
        }

        let id = self.next_conn_id;
        self.next_conn_id += 1;
        let settings = ConnectionSettings {
            envelope: self.config.envelope_config(),
            pending_timeout: self.config.pending_timeout,
        };
        let handle = connection::spawn(stream, Arc::clone(&self.router), settings, id)?;
        self.active = Some(handle);
        Ok(())
    }

    /// Accept connections until the acceptor fails.
    ///
    /// A torn-down connection never stops the listener; only bind-level
    /// failures propagate.
    pub fn serve(&mut self) -> Result<()> {
        loop {
            self.accept_next()?;
        }
    }
}

impl Drop for RpcService {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.close();
        }
    }
}
