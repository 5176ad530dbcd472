//! Asynchronous msgpack-RPC client for an embedded Neovim.
//!
//! The crate starts `nvim --embed --headless` (or any compatible program),
//! writes requests to its stdin and correlates the responses it prints on
//! stdout, which may arrive in any order and split across arbitrary chunks.
//! Results are decoded into typed values: integers, strings, booleans,
//! [`Position`]s and the opaque [`Buffer`], [`Window`] and [`Tabpage`]
//! handles.
//!
//! ```ignore
//! use envim_rpc::{NvimConfig, Session, api};
//!
//! let session = Session::spawn(&NvimConfig::default())?;
//! let line = session.request(api::GET_CURRENT_LINE, Vec::new()).await?;
//! ```
//!
//! The layers, leaves first: [`codec`] frames messages, [`decode`] converts
//! payloads, [`RequestTable`] tracks in-flight calls, [`process`] supervises
//! the editor, [`Dispatcher`] routes incoming messages and [`Session`] ties
//! them together behind an actor task.

pub mod api;
pub mod codec;
mod config;
pub mod decode;
mod dispatch;
mod error;
mod mode;
pub mod process;
mod registry;
mod requests;
mod session;
mod types;

pub use api::Method;
pub use codec::{Encoder, FrameDecoder, MAX_MESSAGE_SIZE, MessageKind};
pub use config::NvimConfig;
pub use decode::{Decode, Object, PartialList, ValueKind};
pub use dispatch::{Continuation, Dispatcher, Notification, PendingRequest, Reply, ServerRequest};
pub use error::{
    CallError, CodecError, DecodeError, ProtocolError, RegistryError, RemoteError, RequestError,
    SessionError, SpawnError,
};
pub use mode::{CursorShape, ModeDescriptor};
pub use process::{ProcessEvent, ProcessHandle, SpawnedProcess};
pub use registry::SessionRegistry;
pub use requests::RequestTable;
pub use rmpv::Value;
pub use session::{PendingCall, Session, Subscription};
pub use types::{Buffer, IntoValue, ObjectHandle, ObjectKind, Position, Tabpage, Window};

#[cfg(test)]
mod tests;
