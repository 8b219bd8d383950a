use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use filewire_envelope::ByteOrder;

use crate::error::{Result, RpcError};

/// Minimum payload: operation (1) + method (1).
const NOTIFICATION_HEADER: usize = 2;

/// Correlated payload: operation (1) + method (1) + correlation id (4).
const CORRELATED_HEADER: usize = 6;

/// Coarse message kind, the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// A call expecting a correlated response.
    Request = 1,
    /// The answer to a previously issued request.
    Response = 2,
    /// Fire-and-forget, no correlation id, no reply.
    Notification = 3,
}

impl Operation {
    /// Decode a wire operation code.
    pub fn from_wire(code: u8) -> Option<Self> {
        match code {
            1 => Some(Operation::Request),
            2 => Some(Operation::Response),
            3 => Some(Operation::Notification),
            _ => None,
        }
    }

    /// The wire code of this operation.
    pub fn wire(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Request => write!(f, "request"),
            Operation::Response => write!(f, "response"),
            Operation::Notification => write!(f, "notification"),
        }
    }
}

/// A classified payload.
///
/// The arguments are opaque to the dispatch layer; their encoding is
/// method-specific and interpreted by the handler.
#[derive(Debug, Clone)]
pub enum Message {
    Request {
        method: u8,
        correlation_id: u32,
        arguments: Bytes,
    },
    Response {
        method: u8,
        correlation_id: u32,
        arguments: Bytes,
    },
    Notification {
        method: u8,
        arguments: Bytes,
    },
}

impl Message {
    /// Classify a decoded envelope payload.
    pub fn decode(payload: Bytes, order: ByteOrder) -> Result<Self> {
        if payload.len() < NOTIFICATION_HEADER {
            return Err(RpcError::TruncatedMessage {
                expected: NOTIFICATION_HEADER,
                actual: payload.len(),
            });
        }

        let operation =
            Operation::from_wire(payload[0]).ok_or(RpcError::UnknownOperation(payload[0]))?;
        let method = payload[1];

        match operation {
            Operation::Request | Operation::Response => {
                if payload.len() < CORRELATED_HEADER {
                    return Err(RpcError::TruncatedMessage {
                        expected: CORRELATED_HEADER,
                        actual: payload.len(),
                    });
                }
                let correlation_id = order.read_u32(payload[2..6].try_into().unwrap());
                let arguments = payload.slice(CORRELATED_HEADER..);
                Ok(match operation {
                    Operation::Request => Message::Request {
                        method,
                        correlation_id,
                        arguments,
                    },
                    _ => Message::Response {
                        method,
                        correlation_id,
                        arguments,
                    },
                })
            }
            Operation::Notification => Ok(Message::Notification {
                method,
                arguments: payload.slice(NOTIFICATION_HEADER..),
            }),
        }
    }

    /// The operation of this message.
    pub fn operation(&self) -> Operation {
        match self {
            Message::Request { .. } => Operation::Request,
            Message::Response { .. } => Operation::Response,
            Message::Notification { .. } => Operation::Notification,
        }
    }

    /// The method code of this message.
    pub fn method(&self) -> u8 {
        match self {
            Message::Request { method, .. }
            | Message::Response { method, .. }
            | Message::Notification { method, .. } => *method,
        }
    }

    /// The correlation id, absent for notifications.
    pub fn correlation_id(&self) -> Option<u32> {
        match self {
            Message::Request { correlation_id, .. } | Message::Response { correlation_id, .. } => {
                Some(*correlation_id)
            }
            Message::Notification { .. } => None,
        }
    }

    /// The raw argument bytes.
    pub fn arguments(&self) -> &Bytes {
        match self {
            Message::Request { arguments, .. }
            | Message::Response { arguments, .. }
            | Message::Notification { arguments, .. } => arguments,
        }
    }
}

/// Encode a request payload.
pub fn encode_request(method: u8, correlation_id: u32, arguments: &[u8], order: ByteOrder) -> Bytes {
    encode_correlated(Operation::Request, method, correlation_id, arguments, order)
}

/// Encode a response payload.
pub fn encode_response(
    method: u8,
    correlation_id: u32,
    arguments: &[u8],
    order: ByteOrder,
) -> Bytes {
    encode_correlated(Operation::Response, method, correlation_id, arguments, order)
}

/// Encode a notification payload. Notifications carry no correlation id.
pub fn encode_notification(method: u8, arguments: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(NOTIFICATION_HEADER + arguments.len());
    buf.put_u8(Operation::Notification.wire());
    buf.put_u8(method);
    buf.put_slice(arguments);
    buf.freeze()
}

fn encode_correlated(
    operation: Operation,
    method: u8,
    correlation_id: u32,
    arguments: &[u8],
    order: ByteOrder,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(CORRELATED_HEADER + arguments.len());
    buf.put_u8(operation.wire());
    buf.put_u8(method);
    buf.put_slice(&order.write_u32(correlation_id));
    buf.put_slice(arguments);
    buf.freeze()
}
