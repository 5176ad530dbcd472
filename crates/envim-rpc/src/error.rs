//! Error types raised by the RPC client.

use std::fmt;
use std::io;

use rmpv::Value;
use thiserror::Error;

use crate::codec::MessageKind;
use crate::decode::ValueKind;
use crate::types::ObjectKind;

/// Failures while turning messages into bytes or bytes into messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Writing a message into the output buffer failed.
    #[error("failed to encode message: {message}")]
    Encode {
        /// Description reported by the encoder.
        message: String,
    },

    /// The input ended before a complete message was read.
    #[error("message truncated after {available} bytes")]
    Truncated {
        /// Number of bytes that were available.
        available: usize,
    },

    /// The input is not valid msgpack.
    #[error("malformed message: {message}")]
    Malformed {
        /// Description reported by the decoder.
        message: String,
    },

    /// Buffered input grew past the workspace limit without completing a
    /// message.
    #[error("incomplete message of {size} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// Bytes buffered when the limit was hit.
        size: usize,
        /// Configured workspace limit.
        max: usize,
    },
}

/// Shape mismatches found while converting a payload into a domain type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The argument array has the wrong number of elements.
    #[error("expected {expected} element(s), got {actual}")]
    Arity {
        /// Required element count.
        expected: usize,
        /// Element count received.
        actual: usize,
    },

    /// An element has the wrong kind.
    #[error("expected {expected}, got {actual}")]
    UnexpectedKind {
        /// Description of the accepted kind.
        expected: &'static str,
        /// Kind that was received.
        actual: ValueKind,
    },

    /// An integer does not fit the target type.
    #[error("integer {value} is out of range for {target}")]
    IntegerOutOfRange {
        /// Rendered integer value.
        value: String,
        /// Name of the target type.
        target: &'static str,
    },

    /// A string element is not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// An object handle carries the tag of another kind.
    #[error("extension tag {tag} is not a {expected} handle")]
    HandleKind {
        /// Handle kind the caller expected.
        expected: ObjectKind,
        /// Extension tag that was received.
        tag: i8,
    },

    /// An extension tag does not name any handle kind.
    #[error("extension tag {tag} is not an editor object handle")]
    UnknownHandleTag {
        /// Extension tag that was received.
        tag: i8,
    },

    /// The extension payload does not hold a usable identifier.
    #[error("{kind} handle payload of {len} bytes does not hold an identifier")]
    HandlePayload {
        /// Handle kind being decoded.
        kind: ObjectKind,
        /// Payload length in bytes.
        len: usize,
    },

    /// A cursor shape name is not recognised.
    #[error("unknown cursor shape '{name}'")]
    UnknownCursorShape {
        /// Name that was received.
        name: String,
    },

    /// The payload kind is deliberately not decoded.
    #[error("decoding {what} is not implemented")]
    Unsupported {
        /// Description of the unsupported payload.
        what: &'static str,
    },
}

/// Failures reported by the pending-request table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No request with this id is waiting for a response.
    #[error("no pending request with id {id}")]
    NotFound {
        /// Identifier that was looked up.
        id: u64,
    },

    /// A request with this id is already pending.
    #[error("request id {id} is already pending")]
    Duplicate {
        /// Identifier that was registered twice.
        id: u64,
    },
}

/// Messages from the editor that do not follow the msgpack-RPC shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The top-level value is not an array.
    #[error("message is {actual}, expected an array")]
    NotAnArray {
        /// Kind of the top-level value.
        actual: ValueKind,
    },

    /// The message array is empty.
    #[error("message array is empty")]
    Empty,

    /// The message-kind field is not a non-negative integer.
    #[error("message kind field is {actual}, expected an integer")]
    InvalidKindField {
        /// Kind of the field.
        actual: ValueKind,
    },

    /// The message-kind field holds an unknown value.
    #[error("unknown message kind {kind}")]
    UnknownKind {
        /// Value of the field.
        kind: u64,
    },

    /// The message array has the wrong number of fields for its kind.
    #[error("{kind} message has {actual} fields, expected {expected}")]
    FieldCount {
        /// Classified message kind.
        kind: MessageKind,
        /// Required field count.
        expected: usize,
        /// Field count received.
        actual: usize,
    },

    /// The request id field is not a non-negative integer.
    #[error("request id field is {actual}, expected a non-negative integer")]
    InvalidId {
        /// Kind of the field.
        actual: ValueKind,
    },

    /// The method name field is not a UTF-8 string.
    #[error("method field is {actual}, expected a string")]
    InvalidMethod {
        /// Kind of the field.
        actual: ValueKind,
    },

    /// The argument field is not an array.
    #[error("arguments field is {actual}, expected an array")]
    InvalidArguments {
        /// Kind of the field.
        actual: ValueKind,
    },
}

/// Error value returned by the editor in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Numeric error class when the editor sent `[class, message]`.
    pub kind: Option<i64>,
    /// Human-readable message.
    pub message: String,
}

impl RemoteError {
    /// Interprets the error field of a response.
    ///
    /// Neovim sends `[class, message]`; any other shape is rendered verbatim.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        if let Value::Array(fields) = value
            && let [Value::Integer(class), Value::String(text)] = fields.as_slice()
            && let Some(message) = text.as_str()
        {
            return Self {
                kind: class.as_i64(),
                message: message.to_owned(),
            };
        }
        match value {
            Value::String(text) => Self {
                kind: None,
                message: text
                    .as_str()
                    .map_or_else(|| value.to_string(), str::to_owned),
            },
            other => Self {
                kind: None,
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => write!(formatter, "{} (class {kind})", self.message),
            None => formatter.write_str(&self.message),
        }
    }
}

/// Outcome delivered to a caller whose call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The request could not be encoded.
    #[error("failed to encode call to {method}: {source}")]
    Encode {
        /// Remote method name.
        method: String,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },

    /// The editor answered with an error.
    #[error("{method} failed in the editor: {error}")]
    Remote {
        /// Remote method name.
        method: String,
        /// Error reported by the editor.
        error: RemoteError,
    },

    /// The result did not have the shape the caller expected.
    #[error("unexpected result from {method}: {source}")]
    Decode {
        /// Remote method name.
        method: String,
        /// Underlying shape mismatch.
        #[source]
        source: DecodeError,
    },

    /// The session ended before the response arrived.
    #[error("connection to the editor closed before the call completed")]
    ConnectionClosed,
}

/// Failures while launching the editor process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The editor binary was not found.
    #[error("editor binary not found: {command}")]
    BinaryNotFound {
        /// The command that was not found.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Launching the process failed.
    #[error("failed to spawn editor process: {message}")]
    SpawnFailed {
        /// Description of the failure.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Failures while creating a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The editor process could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Failures reported by [`crate::SessionRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A session for this process id is already registered.
    #[error("a session for process {pid} is already registered")]
    Duplicate {
        /// Process id of the existing session.
        pid: u32,
    },

    /// The session is not attached to a supervised process.
    #[error("session has no supervised process to key it by")]
    Detached,
}
