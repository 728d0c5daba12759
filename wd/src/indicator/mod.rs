//! Status indicator
//!
//! A single binary output (the device's green LED). Writes are fire-and-forget:
//! once a backend is set up, a failed write is logged and otherwise ignored so
//! the poll loop never stalls on the indicator.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::{IndicatorConfig, IndicatorKind};

mod memory;
mod sysfs;

pub use memory::RecordingIndicator;
pub use sysfs::{GpioPin, LedClass};

/// Errors raised while setting up an indicator backend
#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out waiting for {0} to appear")]
    Timeout(PathBuf),
}

/// Binary output signal
pub trait Indicator {
    /// Set the output; never blocks, never fails observably
    fn set(&mut self, on: bool);

    /// Switch on, hold, switch off
    fn pulse(&mut self, hold: Duration) {
        self.set(true);
        std::thread::sleep(hold);
        self.set(false);
    }
}

impl<I: Indicator + ?Sized> Indicator for Box<I> {
    fn set(&mut self, on: bool) {
        (**self).set(on);
    }

    fn pulse(&mut self, hold: Duration) {
        (**self).pulse(hold);
    }
}

/// Indicator for hosts without the LED: transitions go to the log
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        debug!(on, "indicator");
    }
}

/// Set up the configured backend, leaving it switched off
pub fn open_indicator(config: &IndicatorConfig) -> Result<Box<dyn Indicator>, IndicatorError> {
    debug!(kind = ?config.kind, "open_indicator: called");
    match config.kind {
        IndicatorKind::Led => Ok(Box::new(LedClass::open(&config.path)?)),
        IndicatorKind::Gpio => Ok(Box::new(GpioPin::open(&config.sysfs_root, config.pin)?)),
        IndicatorKind::Log => Ok(Box::new(LogIndicator)),
    }
}
