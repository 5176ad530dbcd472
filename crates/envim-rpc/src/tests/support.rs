//! Wire fixtures and an in-memory stand-in for the editor process.

use bytes::BytesMut;
use rmpv::Value;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;

use crate::codec::{Encoder, FrameDecoder};
use crate::process::{ProcessEvent, ProcessHandle};
use crate::session::Session;
use crate::types::ObjectKind;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Encodes a successful response.
pub(crate) fn response(id: u64, result: Value) -> Vec<u8> {
    Encoder::new()
        .encode_response(id, Value::Nil, result)
        .expect("encode response")
        .to_vec()
}

/// Encodes an error response in Neovim's `[class, message]` shape.
pub(crate) fn error_response(id: u64, message: &str) -> Vec<u8> {
    let error = Value::Array(vec![Value::from(0_u64), Value::from(message)]);
    Encoder::new()
        .encode_response(id, error, Value::Nil)
        .expect("encode error response")
        .to_vec()
}

/// Encodes a notification.
pub(crate) fn notification(method: &str, args: Vec<Value>) -> Vec<u8> {
    Encoder::new()
        .encode_notification(method, args)
        .expect("encode notification")
        .to_vec()
}

/// Encodes a request initiated by the editor.
pub(crate) fn server_request(id: u64, method: &str) -> Vec<u8> {
    Encoder::new()
        .encode_request(id, method, Vec::new())
        .expect("encode request")
        .to_vec()
}

/// Builds a handle extension value the way Neovim packs it.
pub(crate) fn handle(kind: ObjectKind, id: u8) -> Value {
    let mut payload = Vec::new();
    rmpv::encode::write_value(&mut payload, &Value::from(id)).expect("encode handle id");
    Value::Ext(kind.tag(), payload)
}

/// A request as the fake editor received it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReceivedRequest {
    pub(crate) id: u64,
    pub(crate) method: String,
    pub(crate) args: Vec<Value>,
}

/// The editor side of a session: reads what the session writes and feeds
/// output events back.
pub(crate) struct FakeEditor {
    input: DuplexStream,
    frames: FrameDecoder,
    events: Option<mpsc::UnboundedSender<ProcessEvent>>,
}

impl FakeEditor {
    /// Starts a session wired to a fake editor. Must run inside a runtime.
    pub(crate) fn connect() -> (Session, Self) {
        Self::connect_with(None)
    }

    /// Like [`FakeEditor::connect`], with the session owning `process`.
    pub(crate) fn connect_with(process: Option<ProcessHandle>) -> (Session, Self) {
        let (writer, input) = tokio::io::duplex(PIPE_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Session::connect(writer, events_rx, process);
        let editor = Self {
            input,
            frames: FrameDecoder::new(),
            events: Some(events_tx),
        };
        (session, editor)
    }

    /// Waits for the next message the session writes.
    pub(crate) async fn next_message(&mut self) -> Value {
        loop {
            if let Some(message) = self.frames.next_message().expect("session writes msgpack") {
                return message;
            }
            let mut chunk = BytesMut::with_capacity(4096);
            let read = self
                .input
                .read_buf(&mut chunk)
                .await
                .expect("read session output");
            assert!(read > 0, "session closed its output");
            self.frames.push(&chunk);
        }
    }

    /// Waits for the next request the session writes.
    pub(crate) async fn next_request(&mut self) -> ReceivedRequest {
        let message = self.next_message().await;
        match message {
            Value::Array(fields) => match fields.as_slice() {
                [kind, id, Value::String(method), Value::Array(args)]
                    if kind.as_u64() == Some(0) =>
                {
                    ReceivedRequest {
                        id: id.as_u64().expect("request id"),
                        method: method.as_str().expect("method name").to_owned(),
                        args: args.clone(),
                    }
                }
                other => panic!("expected a request, got {other:?}"),
            },
            other => panic!("expected an array, got {other:?}"),
        }
    }

    /// Delivers bytes as if the editor printed them on stdout.
    pub(crate) fn send(&self, bytes: &[u8]) {
        self.emit(ProcessEvent::Stdout(bytes.to_vec().into()));
    }

    /// Delivers a lifecycle or output event.
    pub(crate) fn emit(&self, event: ProcessEvent) {
        self.events
            .as_ref()
            .expect("editor output still open")
            .send(event)
            .expect("session is listening");
    }

    /// Reports an exit and closes the output stream.
    pub(crate) fn exit(&mut self, code: Option<i32>) {
        if let Some(events) = self.events.take() {
            events
                .send(ProcessEvent::Exited { code })
                .expect("session is listening");
        }
    }
}
