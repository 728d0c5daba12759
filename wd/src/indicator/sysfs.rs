//! Linux sysfs indicator backends
//!
//! - [`LedClass`]: an LED exposed under `/sys/class/leds/<name>`
//! - [`GpioPin`]: a raw output pin under `/sys/class/gpio`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Indicator, IndicatorError};

/// How long a freshly exported pin may take to show up in sysfs
const EXPORT_WAIT: Duration = Duration::from_secs(1);

fn write_attr(path: &Path, value: &str) -> Result<(), IndicatorError> {
    fs::write(path, value).map_err(|source| IndicatorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn level(on: bool) -> &'static str {
    if on { "1" } else { "0" }
}

/// LED class device (`brightness` / `trigger` attributes)
#[derive(Debug)]
pub struct LedClass {
    brightness: PathBuf,
}

impl LedClass {
    /// Take over the LED and switch it off
    ///
    /// Any kernel trigger (heartbeat, mmc activity, ...) is replaced with
    /// `none` so it does not fight our writes. Safe to call repeatedly.
    pub fn open(dir: &Path) -> Result<Self, IndicatorError> {
        debug!(?dir, "LedClass::open: called");
        let trigger = dir.join("trigger");
        if trigger.exists() {
            write_attr(&trigger, "none")?;
        }
        let brightness = dir.join("brightness");
        write_attr(&brightness, "0")?;
        Ok(Self { brightness })
    }
}

impl Indicator for LedClass {
    fn set(&mut self, on: bool) {
        if let Err(e) = write_attr(&self.brightness, level(on)) {
            warn!(error = %e, "LED write failed");
        }
    }
}

impl Drop for LedClass {
    fn drop(&mut self) {
        self.set(false);
    }
}

/// Pins this process exported, keyed by pin directory, with live handle counts
static EXPORTED: Mutex<Option<HashMap<PathBuf, usize>>> = Mutex::new(None);

fn exported_pins() -> MutexGuard<'static, Option<HashMap<PathBuf, usize>>> {
    EXPORTED.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// sysfs GPIO output pin
///
/// A pin exported by this process is shared by every handle opened on it and
/// unexported when the last of them drops. A pin exported by someone else is
/// never unexported. Dropping any handle drives the pin low.
#[derive(Debug)]
pub struct GpioPin {
    root: PathBuf,
    pin: u32,
    value: PathBuf,
    exported: bool,
}

impl GpioPin {
    /// Export the pin if needed, configure it as an output and drive it low
    pub fn open(root: &Path, pin: u32) -> Result<Self, IndicatorError> {
        Self::open_with_wait(root, pin, EXPORT_WAIT)
    }

    pub fn open_with_wait(root: &Path, pin: u32, wait: Duration) -> Result<Self, IndicatorError> {
        debug!(?root, pin, "GpioPin::open: called");
        let pin_dir = root.join(format!("gpio{}", pin));

        // An already exported pin belongs to whoever exported it
        let mut pins = exported_pins();
        let owned = pins.get_or_insert_with(HashMap::new);
        let exported = if let Some(handles) = owned.get_mut(&pin_dir) {
            *handles += 1;
            true
        } else if pin_dir.exists() {
            false
        } else {
            write_attr(&root.join("export"), &pin.to_string())?;
            let deadline = Instant::now() + wait;
            while !pin_dir.exists() {
                if Instant::now() >= deadline {
                    return Err(IndicatorError::Timeout(pin_dir));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            owned.insert(pin_dir.clone(), 1);
            true
        };
        drop(pins);

        // Built before configuring so a failed write still releases the export
        let gpio = Self {
            root: root.to_path_buf(),
            pin,
            value: pin_dir.join("value"),
            exported,
        };
        write_attr(&pin_dir.join("direction"), "out")?;
        write_attr(&gpio.value, "0")?;
        debug!(pin, exported, "GpioPin::open: pin ready");

        Ok(gpio)
    }
}

impl Indicator for GpioPin {
    fn set(&mut self, on: bool) {
        if let Err(e) = write_attr(&self.value, level(on)) {
            warn!(pin = self.pin, error = %e, "GPIO write failed");
        }
    }
}

impl GpioPin {
    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    /// Release this handle's share of the export, true when it was the last one
    fn release(&self) -> bool {
        let mut pins = exported_pins();
        let Some(owned) = pins.as_mut() else {
            return true;
        };
        let pin_dir = self.pin_dir();
        match owned.get_mut(&pin_dir) {
            Some(handles) if *handles > 1 => {
                *handles -= 1;
                false
            }
            _ => {
                owned.remove(&pin_dir);
                true
            }
        }
    }
}

impl Drop for GpioPin {
    fn drop(&mut self) {
        self.set(false);
        if self.exported && self.release() {
            if let Err(e) = write_attr(&self.root.join("unexport"), &self.pin.to_string()) {
                warn!(pin = self.pin, error = %e, "GPIO unexport failed");
            }
        }
    }
}
