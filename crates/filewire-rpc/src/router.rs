use std::collections::HashMap;
use std::fmt;

use crate::connection::RequestContext;
use crate::error::{Result, RpcError};
use crate::message::{Message, Operation};

/// Handler for an inbound request. May reply synchronously through the
/// context or defer by registering a pending entry.
pub type RequestHandler =
    Box<dyn Fn(&mut RequestContext<'_>, u32, &[u8]) -> Result<()> + Send + Sync>;

/// Handler for an inbound response to a request this side issued earlier.
pub type ResponseHandler = Box<dyn Fn(u32, &[u8]) -> Result<()> + Send + Sync>;

/// Handler for an inbound notification. No correlation id, no reply.
pub type NotificationHandler = Box<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

/// Dispatch registry: one handler per (operation, method) pair.
///
/// Registered once at setup, read-only during traffic. Registering a method
/// twice silently replaces the earlier handler, matching setup-time-only
/// registration semantics.
#[derive(Default)]
pub struct Router {
    requests: HashMap<u8, RequestHandler>,
    responses: HashMap<u8, ResponseHandler>,
    notifications: HashMap<u8, NotificationHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request handler for `method`.
    pub fn on_request<F>(&mut self, method: u8, handler: F) -> &mut Self
    where
        F: Fn(&mut RequestContext<'_>, u32, &[u8]) -> Result<()> + Send + Sync + 'static,
    {
        self.requests.insert(method, Box::new(handler));
        self
    }

    /// Register a response handler for `method`.
    pub fn on_response<F>(&mut self, method: u8, handler: F) -> &mut Self
    where
        F: Fn(u32, &[u8]) -> Result<()> + Send + Sync + 'static,
    {
        self.responses.insert(method, Box::new(handler));
        self
    }

    /// Register a notification handler for `method`.
    pub fn on_notification<F>(&mut self, method: u8, handler: F) -> &mut Self
    where
        F: Fn(&[u8]) -> Result<()> + Send + Sync + 'static,
    {
        self.notifications.insert(method, Box::new(handler));
        self
    }

    /// Whether a handler is registered for the pair.
    pub fn handles(&self, operation: Operation, method: u8) -> bool {
        match operation {
            Operation::Request => self.requests.contains_key(&method),
            Operation::Response => self.responses.contains_key(&method),
            Operation::Notification => self.notifications.contains_key(&method),
        }
    }

    /// Route a classified message to its handler.
    ///
    /// An unregistered (operation, method) pair fails with
    /// `UnhandledMethod`, which is connection-fatal.
    pub fn dispatch(&self, ctx: &mut RequestContext<'_>, message: &Message) -> Result<()> {
        match message {
            Message::Request {
                method,
                correlation_id,
                arguments,
            } => {
                let handler =
                    self.requests
                        .get(method)
                        .ok_or(RpcError::UnhandledMethod {
                            operation: Operation::Request,
                            method: *method,
                        })?;
                handler(ctx, *correlation_id, arguments)
            }
            Message::Response {
                method,
                correlation_id,
                arguments,
            } => {
                let handler =
                    self.responses
                        .get(method)
                        .ok_or(RpcError::UnhandledMethod {
                            operation: Operation::Response,
                            method: *method,
                        })?;
                handler(*correlation_id, arguments)
            }
            Message::Notification { method, arguments } => {
                let handler =
                    self.notifications
                        .get(method)
                        .ok_or(RpcError::UnhandledMethod {
                            operation: Operation::Notification,
                            method: *method,
                        })?;
                handler(arguments)
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("requests", &self.requests.len())
            .field("responses", &self.responses.len())
            .field("notifications", &self.notifications.len())
            .finish()
    }
}

/// Factory producing a fully wired [`Router`].
pub type RouterFactory = Box<dyn Fn() -> Router + Send + Sync>;

/// Explicit name → factory registry for router selection.
///
/// Resolved once at service bind time; the configured name picks the
/// factory, so deployments stay pluggable without runtime reflection.
#[derive(Default)]
pub struct RouterCatalog {
    factories: HashMap<String, RouterFactory>,
}

impl RouterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Router + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Build the router registered under `name`.
    pub fn build(&self, name: &str) -> Result<Router> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| RpcError::UnknownRouter(name.to_string()))
    }

    /// Registered router names.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
