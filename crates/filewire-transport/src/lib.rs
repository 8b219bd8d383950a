//! TCP transport layer for filewire peer connections.
//!
//! This is the lowest layer of filewire. Everything else builds on top of
//! the [`TcpChannel`] type provided here: a connected byte stream with
//! timeout control and independent read/write handles via [`TcpChannel::try_clone`].

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::TcpChannel;
pub use tcp::{connect, connect_timeout, TcpAcceptor};
