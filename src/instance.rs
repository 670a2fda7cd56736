use crate::capabilities::PidProbe;
use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    AlreadyRunning { pid: u32 },
    StaleCleaned,
}

pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn acquire(&self, probe: PidProbe) -> Result<LockOutcome> {
        let mut cleaned_stale = false;

        if self.path.exists() {
            let raw = fs::read_to_string(&self.path).unwrap_or_default();
            match raw.trim().parse::<u32>() {
                Ok(pid) if pid != std::process::id() && pid_alive(pid, probe) => {
                    return Ok(LockOutcome::AlreadyRunning { pid });
                }
                Ok(pid) => {
                    info!(pid, "cleaning up stale instance marker");
                    self.remove_marker();
                    cleaned_stale = true;
                }
                Err(_) => {
                    info!("cleaning up invalid instance marker");
                    self.remove_marker();
                    cleaned_stale = true;
                }
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("create lock dir")?;
            }
        }
        fs::write(&self.path, std::process::id().to_string()).context("write instance marker")?;
        info!(pid = std::process::id(), path = %self.path.display(), "instance locked");

        Ok(if cleaned_stale {
            LockOutcome::StaleCleaned
        } else {
            LockOutcome::Acquired
        })
    }

    pub fn release(&self) {
        if self.path.exists() {
            if let Err(err) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), %err, "failed to remove instance marker");
            }
        }
    }

    fn remove_marker(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %err, "failed to remove stale marker");
        }
    }
}

#[cfg(feature = "proc-detect")]
fn pid_alive(pid: u32, probe: PidProbe) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

    if probe == PidProbe::Unavailable {
        return false;
    }
    let system =
        System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()));
    system.process(Pid::from_u32(pid)).is_some()
}

// Without process introspection every existing marker reads as stale; a
// second instance steals the lock instead of refusing to start.
#[cfg(not(feature = "proc-detect"))]
fn pid_alive(_pid: u32, _probe: PidProbe) -> bool {
    false
}
