//! Health classification
//!
//! Pure logic: given one cycle's [`Snapshot`], decide whether supervisord and
//! every required process are running. Failures are reported through an
//! injected [`HealthReporter`] rather than a global logger handle.

use serde::{Deserialize, Serialize};
use tracing::error;

/// The only state name that counts as healthy
pub const RUNNING: &str = "RUNNING";

/// Default supervisord group the device processes live in
pub const DEFAULT_GROUP: &str = "epidose";

/// Default processes that must be running
pub const DEFAULT_PROCESSES: [&str; 4] = ["beacon_rx", "beacon_tx", "update_filter", "upload_seeds"];

/// Check a run-state name
pub fn is_running(state: &str) -> bool {
    state == RUNNING
}

/// Ordered set of processes that must all be running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequiredProcesses {
    /// supervisord group the processes are declared in
    pub group: String,

    /// Short process names, checked in this order
    pub names: Vec<String>,
}

impl Default for RequiredProcesses {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP, DEFAULT_PROCESSES)
    }
}

impl RequiredProcesses {
    pub fn new<I, S>(group: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group: group.to_string(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Name as supervisord knows it (`group:process`)
    pub fn qualified(&self, name: &str) -> String {
        format!("{}:{}", self.group, name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// State of one required process within a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReading {
    pub name: String,
    pub state: String,
}

impl ProcessReading {
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
        }
    }
}

/// One poll cycle's readings
///
/// Processes are only read while the supervisor is running, so `processes`
/// is empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub supervisor: String,
    pub processes: Vec<ProcessReading>,
}

/// Sink for health diagnostics
pub trait HealthReporter {
    /// supervisord itself is not running
    fn supervisor_down(&self, state: &str);

    /// The first required process found not running
    fn process_down(&self, name: &str, state: &str);
}

/// Reports failures as error-level tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl HealthReporter for TracingReporter {
    fn supervisor_down(&self, state: &str) {
        error!(state, "supervisord not running");
    }

    fn process_down(&self, name: &str, state: &str) {
        error!(process = name, state, "{} not running", name);
    }
}

/// Classifies snapshots against the required process set
#[derive(Debug, Clone)]
pub struct HealthEvaluator<R = TracingReporter> {
    required: RequiredProcesses,
    reporter: R,
}

impl HealthEvaluator<TracingReporter> {
    pub fn with_tracing(required: RequiredProcesses) -> Self {
        Self::new(required, TracingReporter)
    }
}

impl<R: HealthReporter> HealthEvaluator<R> {
    pub fn new(required: RequiredProcesses, reporter: R) -> Self {
        Self { required, reporter }
    }

    pub fn required(&self) -> &RequiredProcesses {
        &self.required
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// True iff supervisord reports `RUNNING`
    pub fn check_supervisor(&self, state: &str) -> bool {
        if is_running(state) {
            true
        } else {
            self.reporter.supervisor_down(state);
            false
        }
    }

    /// True iff every required process reads `RUNNING`
    ///
    /// Walks the required set in order and stops at the first failure, which
    /// is the only one reported. A required process missing from `readings`
    /// counts as not running.
    pub fn check_processes(&self, readings: &[ProcessReading]) -> bool {
        for name in self.required.iter() {
            let state = readings
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.state.as_str())
                .unwrap_or("UNKNOWN");
            if !is_running(state) {
                self.reporter.process_down(name, state);
                return false;
            }
        }
        true
    }

    /// Aggregate verdict; process states are ignored unless the supervisor runs
    pub fn evaluate(&self, snapshot: &Snapshot) -> bool {
        self.check_supervisor(&snapshot.supervisor) && self.check_processes(&snapshot.processes)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Report {
        SupervisorDown(String),
        ProcessDown { name: String, state: String },
    }

    /// Reporter that keeps every diagnostic for assertions
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        reports: RefCell<Vec<Report>>,
    }

    impl RecordingReporter {
        pub fn reports(&self) -> Vec<Report> {
            self.reports.borrow().clone()
        }
    }

    impl HealthReporter for RecordingReporter {
        fn supervisor_down(&self, state: &str) {
            self.reports.borrow_mut().push(Report::SupervisorDown(state.to_string()));
        }

        fn process_down(&self, name: &str, state: &str) {
            self.reports.borrow_mut().push(Report::ProcessDown {
                name: name.to_string(),
                state: state.to_string(),
            });
        }
    }
}
