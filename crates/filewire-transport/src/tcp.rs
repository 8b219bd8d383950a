use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::TcpChannel;

/// TCP listening socket.
///
/// Binds to an address and hands out [`TcpChannel`]s for incoming
/// connections. Binding to port 0 picks an ephemeral port; the resolved
/// address is available through [`TcpAcceptor::local_addr`].
pub struct TcpAcceptor {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpAcceptor {
    /// Bind and listen on a TCP address.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let addr = listener.local_addr()?;

        info!(%addr, "listening for connections");

        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<TcpChannel> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(TcpChannel::from_std(stream))
    }

    /// The address this acceptor is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Connect to a listening peer (blocking).
pub fn connect(addr: SocketAddr) -> Result<TcpChannel> {
    let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
        addr: addr.to_string(),
        source: e,
    })?;
    debug!(%addr, "connected");
    Ok(TcpChannel::from_std(stream))
}

/// Connect to a listening peer, giving up after `timeout`.
pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<TcpChannel> {
    let stream =
        TcpStream::connect_timeout(&addr, timeout).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
    debug!(%addr, "connected");
    Ok(TcpChannel::from_std(stream))
}
