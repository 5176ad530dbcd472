//! Sessions with a running editor.
//!
//! Each session is one actor task (the instance) that owns the dispatcher,
//! the encoder and the process handle. [`Session`] is a cheap, cloneable
//! handle that sends commands to the instance; calls return a
//! [`PendingCall`] that resolves once the correlated response arrives.
//!
//! The instance stops when [`Session::shutdown`] is called, when every
//! handle is dropped, or when the editor's output ends. Stopping fails every
//! pending call with [`CallError::ConnectionClosed`] and kills the process.

use std::fmt;
use std::future::Future;
use std::io;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use rmpv::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::api::Method;
use crate::codec::Encoder;
use crate::config::NvimConfig;
use crate::decode::Decode;
use crate::dispatch::{
    Continuation, Dispatcher, Notification, PendingRequest, Reply, ServerRequest,
};
use crate::error::{CallError, SessionError};
use crate::process::{self, ProcessEvent, ProcessHandle, SpawnedProcess};

/// Log target for session lifecycle and calls.
pub(crate) const SESSION_TARGET: &str = "envim_rpc::session";

enum Command {
    Call {
        method: String,
        args: Vec<Value>,
        continuation: Continuation,
    },
    Notify {
        method: String,
        args: Vec<Value>,
    },
    Subscribe {
        method: String,
        subscriber: mpsc::UnboundedSender<Notification>,
    },
    Shutdown,
}

/// Handle to a running session.
#[derive(Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    pid: Option<u32>,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("pid", &self.pid)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl Session {
    /// Launches the editor and starts a session with it.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Spawn`] if the process cannot be started.
    pub fn spawn(config: &NvimConfig) -> Result<Self, SessionError> {
        let SpawnedProcess {
            handle,
            stdin,
            events,
        } = process::spawn(config)?;
        Ok(Self::connect(stdin, events, Some(handle)))
    }

    /// Starts a session over an arbitrary writer and event stream.
    ///
    /// `writer` receives the encoded outgoing messages and `events` supplies
    /// the editor's output. When `process` is given, the session owns it and
    /// kills it on teardown.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect<W>(
        writer: W,
        events: mpsc::UnboundedReceiver<ProcessEvent>,
        process: Option<ProcessHandle>,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pid = process.as_ref().map(ProcessHandle::pid);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_outgoing(writer, outgoing_rx));
        let instance = Instance {
            dispatcher: Dispatcher::new(),
            encoder: Encoder::new(),
            outgoing,
            process,
            commands: command_rx,
            events,
            exited: false,
        };
        tokio::spawn(instance.run());
        info!(target: SESSION_TARGET, ?pid, "session started");
        Self { commands, pid }
    }

    /// Process id of the supervised editor, if the session owns one.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the instance has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Calls `method` and decodes the result as `T`.
    ///
    /// The request is queued immediately; awaiting the returned future only
    /// waits for the response.
    pub fn call<T>(&self, method: impl Into<String>, args: Vec<Value>) -> PendingCall<T>
    where
        T: Decode + Send + 'static,
    {
        let name: String = method.into();
        let (sender, receiver) = oneshot::channel();
        let decoded_method = name.clone();
        let continuation: Continuation = Box::new(move |reply: Reply| {
            let outcome = reply.and_then(|value| {
                T::decode(&value).map_err(|source| CallError::Decode {
                    method: decoded_method,
                    source,
                })
            });
            if sender.send(outcome).is_err() {
                debug!(target: SESSION_TARGET, "caller stopped waiting for a result");
            }
        });
        // A closed instance drops the command and with it the sender, so the
        // receiver reports the connection as closed.
        if self
            .commands
            .send(Command::Call {
                method: name,
                args,
                continuation,
            })
            .is_err()
        {
            debug!(target: SESSION_TARGET, "call issued on a closed session");
        }
        PendingCall { receiver }
    }

    /// Calls an entry of the method table.
    pub fn request<T>(&self, method: Method<T>, args: Vec<Value>) -> PendingCall<T>
    where
        T: Decode + Send + 'static,
    {
        self.call(method.name(), args)
    }

    /// Sends a notification; no response is expected.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::ConnectionClosed`] if the instance has stopped.
    pub fn notify(&self, method: impl Into<String>, args: Vec<Value>) -> Result<(), CallError> {
        self.commands
            .send(Command::Notify {
                method: method.into(),
                args,
            })
            .map_err(|_| CallError::ConnectionClosed)
    }

    /// Subscribes to notifications named `method`.
    ///
    /// The subscription ends when the instance stops.
    #[must_use]
    pub fn subscribe(&self, method: impl Into<String>) -> Subscription {
        let (subscriber, receiver) = mpsc::unbounded_channel();
        if self
            .commands
            .send(Command::Subscribe {
                method: method.into(),
                subscriber,
            })
            .is_err()
        {
            debug!(target: SESSION_TARGET, "subscription on a closed session");
        }
        Subscription { receiver }
    }

    /// Tears the instance down, failing every pending call.
    pub fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).is_err() {
            debug!(target: SESSION_TARGET, "session already closed");
        }
    }
}

/// The eventual outcome of a call.
#[derive(Debug)]
#[must_use = "a call's outcome is only observed by awaiting it"]
pub struct PendingCall<T> {
    receiver: oneshot::Receiver<Result<T, CallError>>,
}

impl<T> PendingCall<T> {
    /// Returns the outcome if it has already been delivered.
    pub fn try_outcome(&mut self) -> Option<Result<T, CallError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CallError::ConnectionClosed)),
        }
    }
}

impl<T> Future for PendingCall<T> {
    type Output = Result<T, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CallError::ConnectionClosed)))
    }
}

/// Notifications for one method name.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Notification>,
}

impl Subscription {
    /// Waits for the next notification; `None` once the session has stopped.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Returns a notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

/// Actor state for one session.
struct Instance {
    dispatcher: Dispatcher,
    encoder: Encoder,
    outgoing: mpsc::UnboundedSender<Bytes>,
    process: Option<ProcessHandle>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    exited: bool,
}

enum Step {
    Command(Option<Command>),
    Event(Option<ProcessEvent>),
}

impl Instance {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                event = self.events.recv() => Step::Event(event),
            };
            let flow = match step {
                Step::Command(Some(command)) => self.handle_command(command),
                Step::Command(None) => {
                    debug!(target: SESSION_TARGET, "every session handle dropped");
                    ControlFlow::Break(())
                }
                Step::Event(Some(event)) => {
                    self.handle_event(event);
                    ControlFlow::Continue(())
                }
                Step::Event(None) => {
                    debug!(target: SESSION_TARGET, "editor output closed");
                    ControlFlow::Break(())
                }
            };
            if flow.is_break() {
                break;
            }
        }
        self.teardown();
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Call {
                method,
                args,
                continuation,
            } => self.issue_call(method, args, continuation),
            Command::Notify { method, args } => self.send_notification(&method, args),
            Command::Subscribe { method, subscriber } => {
                self.dispatcher.subscribe(method, subscriber);
            }
            Command::Shutdown => {
                info!(target: SESSION_TARGET, "session shut down by its owner");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn issue_call(&mut self, method: String, args: Vec<Value>, continuation: Continuation) {
        if self.exited {
            continuation(Err(CallError::ConnectionClosed));
            return;
        }
        let id = self.dispatcher.allocate_id();
        let bytes = match self.encoder.encode_request(id, &method, args) {
            Ok(bytes) => bytes,
            Err(source) => {
                warn!(target: SESSION_TARGET, id, %method, %source, "failed to encode request");
                continuation(Err(CallError::Encode { method, source }));
                return;
            }
        };
        debug!(target: SESSION_TARGET, id, %method, "sending request");
        if let Err(error) = self
            .dispatcher
            .register(id, PendingRequest::new(method, continuation))
        {
            error!(target: SESSION_TARGET, id, %error, "request id collision");
            return;
        }
        if self.outgoing.send(bytes).is_err()
            && let Ok(request) = self.dispatcher.withdraw(id)
        {
            warn!(target: SESSION_TARGET, id, "editor input is closed");
            request.complete(Err(CallError::ConnectionClosed));
        }
    }

    fn send_notification(&mut self, method: &str, args: Vec<Value>) {
        if self.exited {
            debug!(target: SESSION_TARGET, method, "dropping notification after exit");
            return;
        }
        match self.encoder.encode_notification(method, args) {
            Ok(bytes) => {
                debug!(target: SESSION_TARGET, method, "sending notification");
                if self.outgoing.send(bytes).is_err() {
                    warn!(target: SESSION_TARGET, method, "editor input is closed");
                }
            }
            Err(error) => {
                warn!(target: SESSION_TARGET, method, %error, "failed to encode notification");
            }
        }
    }

    fn handle_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Started { pid } => {
                debug!(target: SESSION_TARGET, pid, "editor process running");
            }
            ProcessEvent::Stdout(chunk) => {
                for request in self.dispatcher.receive(&chunk) {
                    self.reject(&request);
                }
            }
            ProcessEvent::Stderr(chunk) => {
                debug!(
                    target: SESSION_TARGET,
                    output = %String::from_utf8_lossy(&chunk),
                    "editor wrote to stderr"
                );
            }
            ProcessEvent::Exited { code } => {
                self.exited = true;
                info!(
                    target: SESSION_TARGET,
                    ?code,
                    pending = self.dispatcher.pending(),
                    "editor process exited"
                );
            }
        }
    }

    /// Answers a request from the editor with an error; this client serves
    /// no methods.
    fn reject(&mut self, request: &ServerRequest) {
        warn!(
            target: SESSION_TARGET,
            id = request.id,
            method = %request.method,
            "rejecting request from the editor"
        );
        let message = format!("envim does not handle '{}'", request.method);
        match self
            .encoder
            .encode_response(request.id, Value::from(message), Value::Nil)
        {
            Ok(bytes) => {
                if self.outgoing.send(bytes).is_err() {
                    debug!(target: SESSION_TARGET, id = request.id, "editor input is closed");
                }
            }
            Err(error) => {
                warn!(target: SESSION_TARGET, id = request.id, %error, "failed to encode rejection");
            }
        }
    }

    fn teardown(&mut self) {
        let cancelled = self.dispatcher.cancel_all(|| CallError::ConnectionClosed);
        if cancelled > 0 {
            warn!(target: SESSION_TARGET, cancelled, "cancelled pending calls");
        }
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Call { continuation, .. } = command {
                continuation(Err(CallError::ConnectionClosed));
            }
        }
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
        info!(target: SESSION_TARGET, "session closed");
    }
}

async fn write_outgoing<W>(mut writer: W, mut outgoing: mpsc::UnboundedReceiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = outgoing.recv().await {
        if let Err(error) = write_message(&mut writer, &bytes).await {
            warn!(target: SESSION_TARGET, %error, "failed to write to the editor");
            break;
        }
    }
    if let Err(error) = writer.shutdown().await {
        debug!(target: SESSION_TARGET, %error, "failed to close editor input");
    }
}

async fn write_message<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
