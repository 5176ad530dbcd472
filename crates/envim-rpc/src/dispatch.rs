//! Routing of incoming messages.
//!
//! The [`Dispatcher`] performs no I/O. It is fed raw stdout chunks, pulls
//! whole messages out of its [`FrameDecoder`], and then:
//!
//! - completes the pending request a response correlates with;
//! - fans notifications out to subscribers of their method;
//! - hands requests initiated by the editor back to its owner, which must
//!   answer them.
//!
//! Anything else is logged and discarded without touching pending requests.

use std::collections::HashMap;
use std::fmt;

use rmpv::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::codec::{FrameDecoder, MessageKind};
use crate::decode::ValueKind;
use crate::error::{CallError, ProtocolError, RemoteError, RequestError};
use crate::requests::RequestTable;

/// Log target for message dispatch.
pub(crate) const DISPATCH_TARGET: &str = "envim_rpc::dispatch";

/// Result field of a response, as sent, or the reason there is none.
pub type Reply = Result<Value, CallError>;

/// Work to run once a response, or a cancellation, arrives.
pub type Continuation = Box<dyn FnOnce(Reply) + Send>;

/// A request waiting for its response.
pub struct PendingRequest {
    method: String,
    continuation: Continuation,
}

impl PendingRequest {
    /// Pairs a method name with the continuation that consumes its reply.
    #[must_use]
    pub fn new(method: impl Into<String>, continuation: Continuation) -> Self {
        Self {
            method: method.into(),
            continuation,
        }
    }

    /// Remote method the request called.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Runs the continuation with `reply`.
    pub fn complete(self, reply: Reply) {
        (self.continuation)(reply);
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingRequest")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// An asynchronous event pushed by the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Event name, such as `redraw`.
    pub method: String,
    /// Event parameters.
    pub args: Vec<Value>,
}

/// A request the editor sent to us.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRequest {
    /// Id the answer must carry.
    pub id: u64,
    /// Requested method.
    pub method: String,
    /// Request parameters.
    pub args: Vec<Value>,
}

enum Inbound {
    Response {
        id: u64,
        error: Value,
        result: Value,
    },
    Notification(Notification),
    Request(ServerRequest),
}

/// Correlates responses with requests and routes notifications.
#[derive(Debug, Default)]
pub struct Dispatcher {
    frames: FrameDecoder,
    requests: RequestTable<PendingRequest>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Notification>>>,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty frame buffer and request table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher around a custom frame decoder.
    #[must_use]
    pub fn with_frames(frames: FrameDecoder) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Hands out the id for the next outgoing request.
    pub const fn allocate_id(&mut self) -> u64 {
        self.requests.allocate_id()
    }

    /// Records an outgoing request as pending.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Duplicate`] if `id` is already pending.
    pub fn register(&mut self, id: u64, request: PendingRequest) -> Result<(), RequestError> {
        self.requests.register(id, request)
    }

    /// Withdraws a pending request, for example because it could not be
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NotFound`] if `id` is not pending.
    pub fn withdraw(&mut self, id: u64) -> Result<PendingRequest, RequestError> {
        self.requests.resolve(id)
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    /// Whether the request with `id` still awaits a response.
    #[must_use]
    pub fn is_pending(&self, id: u64) -> bool {
        self.requests.contains(id)
    }

    /// Adds a subscriber for notifications named `method`.
    pub fn subscribe(
        &mut self,
        method: impl Into<String>,
        subscriber: mpsc::UnboundedSender<Notification>,
    ) {
        self.subscribers
            .entry(method.into())
            .or_default()
            .push(subscriber);
    }

    /// Feeds a chunk of stdout data and handles every message it completes.
    ///
    /// Returns the requests the editor initiated; the caller must answer
    /// them.
    pub fn receive(&mut self, chunk: &[u8]) -> Vec<ServerRequest> {
        self.frames.push(chunk);
        let mut server_requests = Vec::new();
        loop {
            match self.frames.next_message() {
                Ok(Some(message)) => {
                    if let Some(request) = self.dispatch(message) {
                        server_requests.push(request);
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        %error,
                        pending = self.requests.len(),
                        "discarded undecodable input from the editor"
                    );
                    break;
                }
            }
        }
        server_requests
    }

    /// Handles one decoded message.
    ///
    /// Returns the request when the editor initiated one.
    pub fn dispatch(&mut self, message: Value) -> Option<ServerRequest> {
        match classify(message) {
            Ok(Inbound::Response { id, error, result }) => {
                self.complete(id, &error, result);
                None
            }
            Ok(Inbound::Notification(notification)) => {
                self.notify(notification);
                None
            }
            Ok(Inbound::Request(request)) => {
                debug!(
                    target: DISPATCH_TARGET,
                    id = request.id,
                    method = %request.method,
                    "editor sent a request"
                );
                Some(request)
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "discarding invalid message");
                None
            }
        }
    }

    /// Fails every pending request with the error `reason` produces.
    ///
    /// Returns how many requests were cancelled.
    pub fn cancel_all(&mut self, reason: impl Fn() -> CallError) -> usize {
        let mut cancelled = 0;
        for (id, request) in self.requests.drain() {
            debug!(
                target: DISPATCH_TARGET,
                id,
                method = request.method(),
                "cancelling pending request"
            );
            request.complete(Err(reason()));
            cancelled += 1;
        }
        cancelled
    }

    fn complete(&mut self, id: u64, error: &Value, result: Value) {
        let request = match self.requests.resolve(id) {
            Ok(request) => request,
            Err(lookup) => {
                error!(
                    target: DISPATCH_TARGET,
                    id,
                    error = %lookup,
                    pending = self.requests.len(),
                    "response does not match any pending request"
                );
                return;
            }
        };
        debug!(
            target: DISPATCH_TARGET,
            id,
            method = request.method(),
            "received response"
        );
        let reply = if error.is_nil() {
            Ok(result)
        } else {
            let remote = RemoteError::from_value(error);
            warn!(
                target: DISPATCH_TARGET,
                id,
                method = request.method(),
                error = %remote,
                "editor reported an error"
            );
            Err(CallError::Remote {
                method: request.method().to_owned(),
                error: remote,
            })
        };
        request.complete(reply);
    }

    fn notify(&mut self, notification: Notification) {
        let Some(subscribers) = self.subscribers.get_mut(&notification.method) else {
            debug!(
                target: DISPATCH_TARGET,
                method = %notification.method,
                "no subscriber for notification"
            );
            return;
        };
        subscribers.retain(|subscriber| subscriber.send(notification.clone()).is_ok());
        if subscribers.is_empty() {
            self.subscribers.remove(&notification.method);
        }
    }
}

fn classify(message: Value) -> Result<Inbound, ProtocolError> {
    let fields = match message {
        Value::Array(fields) => fields,
        other => {
            return Err(ProtocolError::NotAnArray {
                actual: ValueKind::of(&other),
            });
        }
    };
    let raw_kind = match fields.first() {
        Some(Value::Integer(integer)) => {
            integer
                .as_u64()
                .ok_or(ProtocolError::InvalidKindField {
                    actual: ValueKind::NegativeInteger,
                })?
        }
        Some(other) => {
            return Err(ProtocolError::InvalidKindField {
                actual: ValueKind::of(other),
            });
        }
        None => return Err(ProtocolError::Empty),
    };
    let kind =
        MessageKind::from_u64(raw_kind).ok_or(ProtocolError::UnknownKind { kind: raw_kind })?;
    match kind {
        MessageKind::Response => {
            let [_, id, error, result] = exact_fields(fields, kind)?;
            Ok(Inbound::Response {
                id: request_id(&id)?,
                error,
                result,
            })
        }
        MessageKind::Notification => {
            let [_, method, args] = exact_fields(fields, kind)?;
            Ok(Inbound::Notification(Notification {
                method: method_name(method)?,
                args: arguments(args)?,
            }))
        }
        MessageKind::Request => {
            let [_, id, method, args] = exact_fields(fields, kind)?;
            Ok(Inbound::Request(ServerRequest {
                id: request_id(&id)?,
                method: method_name(method)?,
                args: arguments(args)?,
            }))
        }
    }
}

fn exact_fields<const N: usize>(
    fields: Vec<Value>,
    kind: MessageKind,
) -> Result<[Value; N], ProtocolError> {
    let actual = fields.len();
    <[Value; N]>::try_from(fields).map_err(|_| ProtocolError::FieldCount {
        kind,
        expected: N,
        actual,
    })
}

fn request_id(value: &Value) -> Result<u64, ProtocolError> {
    value.as_u64().ok_or(ProtocolError::InvalidId {
        actual: ValueKind::of(value),
    })
}

fn method_name(value: Value) -> Result<String, ProtocolError> {
    match value {
        Value::String(text) => text.into_str().ok_or(ProtocolError::InvalidMethod {
            actual: ValueKind::String,
        }),
        other => Err(ProtocolError::InvalidMethod {
            actual: ValueKind::of(&other),
        }),
    }
}

fn arguments(value: Value) -> Result<Vec<Value>, ProtocolError> {
    match value {
        Value::Array(args) => Ok(args),
        other => Err(ProtocolError::InvalidArguments {
            actual: ValueKind::of(&other),
        }),
    }
}
