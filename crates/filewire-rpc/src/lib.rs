//! Method dispatch over envelope-framed TCP.
//!
//! This is the protocol brain of filewire. Decoded payloads are classified
//! into Requests, Responses, and Notifications, routed through a
//! process-wide [`Router`], and answered either synchronously from the
//! handler or later through the per-connection [`PendingTable`] when the
//! result depends on an event outside the protocol layer.
//!
//! Each accepted connection is driven by a dedicated actor that owns all
//! per-connection state and consumes a single event channel, so handler
//! bodies run to completion and frames of one connection are never
//! processed concurrently.

pub mod client;
pub mod connection;
pub mod error;
pub mod message;
pub mod pending;
pub mod router;
pub mod service;

pub use client::RpcClient;
pub use connection::{ConnectionHandle, EnvelopeSink, RequestContext, Resolver};
pub use error::{Result, RpcError};
pub use message::{encode_notification, encode_request, encode_response, Message, Operation};
pub use pending::{PendingEntry, PendingTable, Token};
pub use router::{Router, RouterCatalog};
pub use service::{RpcService, ServiceConfig, DEFAULT_PORT};
