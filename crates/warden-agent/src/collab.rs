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

//! Collaborator seams the update coordinator depends on
//!
//! Command execution, identity persistence and updater spawning are external
//! to update orchestration. They enter the coordinator through these traits
//! so the coordinator can be driven end-to-end in tests.

use crate::error::{AgentError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

/// Identity/persistence collaborator: who this agent is and where it lives
pub trait AgentContext: Send + Sync {
    fn agent_id(&self) -> String;
    fn agent_version(&self) -> String;
    fn install_dir(&self) -> PathBuf;
}

/// Command-dispatch collaborator. While an update is in flight the queue
/// must stop handing out new work.
pub trait DispatchGate: Send + Sync {
    fn enter_updating(&self);
    fn resume(&self);
}

/// Gate implementation the command worker polls before dispatching
#[derive(Debug, Default)]
pub struct AtomicDispatchGate {
    updating: AtomicBool,
}

impl AtomicDispatchGate {
    pub fn new() -> Self {
        Self {
            updating: AtomicBool::new(false),
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }
}

impl DispatchGate for AtomicDispatchGate {
    fn enter_updating(&self) {
        self.updating.store(true, Ordering::SeqCst);
        tracing::info!("Command dispatch paused for update");
    }

    fn resume(&self) {
        self.updating.store(false, Ordering::SeqCst);
        tracing::info!("Command dispatch resumed");
    }
}

/// Seam around spawning the updater executable
pub trait UpdaterLauncher: Send + Sync {
    fn launch(&self, updater_bin: &Path, manifest_path: &Path) -> Result<u32>;
}

/// Spawns the updater detached so it survives this process's exit
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl UpdaterLauncher for ProcessLauncher {
    fn launch(&self, updater_bin: &Path, manifest_path: &Path) -> Result<u32> {
        let mut cmd = Command::new(updater_bin);
        cmd.arg(manifest_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group: the updater must keep running after the agent
        // exits, and must not receive signals aimed at the agent's group.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| {
            AgentError::Launch(format!("Failed to start {}: {e}", updater_bin.display()))
        })?;

        Ok(child.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_transitions() {
        let gate = AtomicDispatchGate::new();
        assert!(!gate.is_updating());

        gate.enter_updating();
        assert!(gate.is_updating());

        gate.resume();
        assert!(!gate.is_updating());
    }

    #[test]
    fn test_launch_missing_binary_fails() {
        let launcher = ProcessLauncher;
        let result = launcher.launch(
            Path::new("/nonexistent/warden-updater"),
            Path::new("/tmp/handoff.json"),
        );
        assert!(matches!(result, Err(AgentError::Launch(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_returns_child_pid() {
        let launcher = ProcessLauncher;
        // `true` exits immediately and ignores its argument
        let pid = launcher
            .launch(Path::new("/bin/true"), Path::new("/tmp/handoff.json"))
            .unwrap();
        assert!(pid > 0);
    }
}
