// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Warden.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Bounded wait for the old agent process to exit
//!
//! The watched process is not our child, so there is nothing to `wait()` on;
//! liveness is probed with signal 0. Timeout expiry is the only cancellation
//! mechanism - nobody is around to cancel manually.

use crate::error::{Result, UpdaterError};
use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Block until `pid` exits, or fail with `AgentStopTimeout` after `timeout`
pub fn wait_for_exit(pid: u32, timeout: Duration) -> Result<()> {
    tracing::info!(
        "Waiting up to {}s for process {pid} to exit",
        timeout.as_secs()
    );

    let start = Instant::now();
    let target = Pid::from_raw(pid as i32);

    loop {
        match signal::kill(target, None) {
            // No such process: it has exited (or was already gone)
            Err(Errno::ESRCH) => {
                tracing::info!("Process {pid} has exited");
                return Ok(());
            }
            // Alive (EPERM means alive but not ours - keep waiting)
            Ok(()) | Err(Errno::EPERM) => {}
            Err(e) => {
                return Err(UpdaterError::Io(std::io::Error::other(format!(
                    "kill probe for pid {pid} failed: {e}"
                ))));
            }
        }

        if start.elapsed() >= timeout {
            return Err(UpdaterError::AgentStopTimeout {
                pid,
                waited_secs: timeout.as_secs(),
            });
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}
