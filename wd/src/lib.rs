//! Watchdog - contact tracing device liveness monitor
//!
//! Periodically asks supervisord, over its local Unix socket, whether the
//! device's background processes are running and pulses the green LED once per
//! healthy cycle. It only observes: failed processes are reported, never
//! restarted.
//!
//! # Modules
//!
//! - [`supervisor`] - typed XML-RPC client for supervisord
//! - [`health`] - pure classification of a poll snapshot
//! - [`indicator`] - LED / GPIO output backends
//! - [`watchdog`] - the poll loop
//! - [`config`] - configuration types and loading
//! - [`daemon`] - PID file handling
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod daemon;
pub mod health;
pub mod indicator;
pub mod supervisor;
pub mod watchdog;

// Re-export commonly used types
pub use config::Config;
pub use health::{HealthEvaluator, HealthReporter, ProcessReading, RequiredProcesses, Snapshot, TracingReporter};
pub use indicator::{Indicator, IndicatorError, open_indicator};
pub use supervisor::{ProcessInfo, RpcError, SupervisorClient, SupervisorState, XmlRpcClient};
pub use watchdog::{Survey, Timing, Watchdog};
