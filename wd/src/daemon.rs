//! Daemon bootstrap: PID file management

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tracing::{debug, info, warn};

/// PID file held for the lifetime of the daemon, removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Register the current process, refusing if another live instance owns the file
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!(?path, "PidFile::acquire: called");

        if let Some(pid) = read_pid(&path) {
            if pid != std::process::id() && is_process_running(pid) {
                return Err(eyre::eyre!(
                    "Watchdog already running with PID {} ({})",
                    pid,
                    path.display()
                ));
            }
            warn!(pid, ?path, "Replacing stale PID file");
        }

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create PID file directory")?;
        }

        let pid = std::process::id();
        let mut file = fs::File::create(&path).context("Failed to create PID file")?;
        write!(file, "{}", pid).context("Failed to write PID")?;

        info!(pid, ?path, "Wrote PID file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = ?self.path, error = %e, "Failed to remove PID file");
            } else {
                debug!(path = ?self.path, "Removed PID file");
            }
        }
    }
}

/// Read the PID from a PID file
fn read_pid(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse().ok().filter(|&pid| pid != 0)
}

/// Check if a process with the given PID is running
fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // Sending signal 0 checks if the process exists without affecting it;
    // EPERM means it exists but belongs to someone else
    let result = matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM));
    debug!(pid, result, "is_process_running: checked");
    result
}
