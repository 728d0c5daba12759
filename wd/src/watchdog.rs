//! Poll loop
//!
//! One logical worker: query supervisord, classify, pulse the indicator when
//! healthy, sleep, repeat. Nothing carries over between cycles. A transport
//! fault ends the loop; the caller exits and the init system notices.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::TimingConfig;
use crate::health::{self, HealthEvaluator, HealthReporter, ProcessReading, RequiredProcesses, Snapshot, TracingReporter};
use crate::indicator::Indicator;
use crate::supervisor::{ProcessInfo, RpcError, SupervisorClient, SupervisorState};

/// Pulse and idle durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Indicator on-time for a healthy cycle
    pub pulse: Duration,
    /// Sleep after each cycle
    pub pause: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for Timing {
    fn from(config: &TimingConfig) -> Self {
        Self {
            pulse: Duration::from_millis(config.pulse_ms),
            pause: Duration::from_millis(config.pause_ms),
        }
    }
}

/// The watchdog control loop
pub struct Watchdog<C, I, R = TracingReporter> {
    client: C,
    evaluator: HealthEvaluator<R>,
    indicator: I,
    timing: Timing,
}

impl<C, I, R> Watchdog<C, I, R>
where
    C: SupervisorClient,
    I: Indicator,
    R: HealthReporter,
{
    pub fn new(client: C, evaluator: HealthEvaluator<R>, indicator: I, timing: Timing) -> Self {
        Self {
            client,
            evaluator,
            indicator,
            timing,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn evaluator(&self) -> &HealthEvaluator<R> {
        &self.evaluator
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Read supervisord and, if it is running, every required process in order
    pub fn snapshot(&self) -> Result<Snapshot, RpcError> {
        let supervisor = self.client.supervisor_state()?.statename;
        let mut processes = Vec::new();
        if health::is_running(&supervisor) {
            let required = self.evaluator.required();
            processes.reserve(required.len());
            for name in required.iter() {
                let info = self.client.process_info(&required.qualified(name))?;
                processes.push(ProcessReading::new(name, info.statename));
            }
        }
        Ok(Snapshot { supervisor, processes })
    }

    /// One query/evaluate/signal cycle, returning the verdict
    pub fn run_once(&mut self) -> Result<bool, RpcError> {
        let started = Instant::now();
        let snapshot = self.snapshot()?;
        let healthy = self.evaluator.evaluate(&snapshot);
        debug!(healthy, "Watchdog::run_once: verdict");

        if healthy {
            self.indicator.pulse(self.timing.pulse);
        }
        trace!(elapsed = ?started.elapsed(), "Watchdog::run_once: cycle done");
        Ok(healthy)
    }

    /// Cycle forever; only a transport fault returns
    pub fn run(&mut self) -> Result<Infallible, RpcError> {
        debug!(timing = ?self.timing, "Watchdog::run: starting");
        loop {
            self.run_once()?;
            std::thread::sleep(self.timing.pause);
        }
    }
}

/// Full status report for the one-shot `check` command
///
/// Unlike the poll loop this reads every required process so the report is
/// complete, but still skips processes when supervisord is not running.
#[derive(Debug, Clone, Serialize)]
pub struct Survey {
    pub supervisor: SupervisorState,
    pub processes: Vec<SurveyEntry>,
    pub healthy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyEntry {
    pub name: String,
    pub info: ProcessInfo,
    pub running: bool,
}

impl Survey {
    pub fn collect<C: SupervisorClient>(client: &C, required: &RequiredProcesses) -> Result<Self, RpcError> {
        let supervisor = client.supervisor_state()?;
        let supervisor_up = health::is_running(&supervisor.statename);

        let mut processes = Vec::new();
        if supervisor_up {
            for name in required.iter() {
                let info = client.process_info(&required.qualified(name))?;
                processes.push(SurveyEntry {
                    name: name.to_string(),
                    running: health::is_running(&info.statename),
                    info,
                });
            }
        }

        let healthy = supervisor_up && processes.iter().all(|p| p.running);
        Ok(Self {
            supervisor,
            processes,
            healthy,
        })
    }
}
