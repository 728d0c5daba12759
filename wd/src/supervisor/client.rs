//! SupervisorClient trait and the XML-RPC implementation

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::error::RpcError;
use super::transport::{Transport, UnixSocketTransport};
use super::types::{ProcessInfo, SupervisorState};
use super::xmlrpc::{self, Value};

/// Read-only view of supervisord
///
/// Each call is one synchronous round trip. Failures are returned as-is;
/// nothing is retried or swallowed here.
pub trait SupervisorClient {
    /// `supervisor.getState`
    fn supervisor_state(&self) -> Result<SupervisorState, RpcError>;

    /// `supervisor.getProcessInfo` for a `group:process` name
    fn process_info(&self, name: &str) -> Result<ProcessInfo, RpcError>;
}

/// XML-RPC client over a pluggable transport
#[derive(Debug, Clone)]
pub struct XmlRpcClient<T> {
    transport: T,
}

impl XmlRpcClient<UnixSocketTransport> {
    /// Create a client bound to a supervisord Unix socket
    pub fn unix(socket_path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self::new(UnixSocketTransport::new(socket_path).with_timeout(timeout))
    }
}

impl<T: Transport> XmlRpcClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn invoke(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        debug!(method, "XmlRpcClient::invoke: called");
        let request = xmlrpc::encode_call(method, params);
        let response = self.transport.call(request.as_bytes())?;
        xmlrpc::decode_response(&response)
    }
}

impl<T: Transport> SupervisorClient for XmlRpcClient<T> {
    fn supervisor_state(&self) -> Result<SupervisorState, RpcError> {
        let value = self.invoke("supervisor.getState", &[])?;
        SupervisorState::from_value(&value)
    }

    fn process_info(&self, name: &str) -> Result<ProcessInfo, RpcError> {
        let value = self.invoke("supervisor.getProcessInfo", &[Value::from(name)])?;
        ProcessInfo::from_value(&value)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock supervisor for unit tests
    ///
    /// Serves canned state names and counts every call. A missing process name
    /// answers with the same fault supervisord returns for unknown names.
    pub struct MockSupervisor {
        supervisor: Option<String>,
        processes: HashMap<String, String>,
        supervisor_calls: AtomicUsize,
        process_calls: Mutex<Vec<String>>,
    }

    impl MockSupervisor {
        pub fn new(supervisor: &str) -> Self {
            Self {
                supervisor: Some(supervisor.to_string()),
                processes: HashMap::new(),
                supervisor_calls: AtomicUsize::new(0),
                process_calls: Mutex::new(Vec::new()),
            }
        }

        /// A supervisor whose socket cannot be reached
        pub fn unreachable() -> Self {
            Self {
                supervisor: None,
                ..Self::new("")
            }
        }

        pub fn with_process(mut self, name: &str, state: &str) -> Self {
            self.processes.insert(name.to_string(), state.to_string());
            self
        }

        pub fn supervisor_calls(&self) -> usize {
            self.supervisor_calls.load(Ordering::SeqCst)
        }

        pub fn process_calls(&self) -> Vec<String> {
            self.process_calls.lock().unwrap().clone()
        }
    }

    impl SupervisorClient for MockSupervisor {
        fn supervisor_state(&self) -> Result<SupervisorState, RpcError> {
            self.supervisor_calls.fetch_add(1, Ordering::SeqCst);
            match &self.supervisor {
                Some(statename) => Ok(SupervisorState {
                    statecode: 0,
                    statename: statename.clone(),
                }),
                None => Err(RpcError::Connect {
                    path: PathBuf::from("/run/supervisor.sock"),
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                }),
            }
        }

        fn process_info(&self, name: &str) -> Result<ProcessInfo, RpcError> {
            self.process_calls.lock().unwrap().push(name.to_string());
            let statename = self.processes.get(name).ok_or_else(|| RpcError::Fault {
                code: 10,
                message: format!("BAD_NAME: {}", name),
            })?;
            Ok(ProcessInfo {
                name: name.to_string(),
                statename: statename.clone(),
                ..Default::default()
            })
        }
    }
}
