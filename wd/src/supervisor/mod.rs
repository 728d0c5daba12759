//! Supervisor client
//!
//! Talks to supervisord's XML-RPC interface over its Unix domain socket and
//! exposes the two read-only queries the watchdog needs as a typed
//! [`SupervisorClient`].

pub mod client;
mod error;
pub mod transport;
mod types;
pub mod xmlrpc;

pub use client::{SupervisorClient, XmlRpcClient};
pub use error::RpcError;
pub use transport::{DEFAULT_SOCKET_PATH, Transport, UnixSocketTransport};
pub use types::{ProcessInfo, SupervisorState};
pub use xmlrpc::Value;
