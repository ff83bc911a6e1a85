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

//! OS service-manager collaborator

use crate::error::{Result, UpdaterError};
use std::process::Command;

/// Service-manager seam used by the state machine and the watchdog
pub trait ServiceManager {
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn is_active(&self) -> Result<bool>;
}

/// systemd-backed implementation driving the agent's service unit
pub struct SystemdService {
    unit: String,
}

impl SystemdService {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
        }
    }

    fn systemctl(&self, verb: &str) -> std::io::Result<std::process::Output> {
        Command::new("systemctl").arg(verb).arg(&self.unit).output()
    }
}

impl ServiceManager for SystemdService {
    fn start(&self) -> Result<()> {
        tracing::info!("Starting service {}", self.unit);
        let output = self
            .systemctl("start")
            .map_err(|e| UpdaterError::ServiceStart(format!("systemctl start: {e}")))?;

        if !output.status.success() {
            return Err(UpdaterError::ServiceStart(format!(
                "systemctl start {} exited {}: {}",
                self.unit,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        tracing::info!("Stopping service {}", self.unit);
        let output = self
            .systemctl("stop")
            .map_err(|e| UpdaterError::ServiceStop(format!("systemctl stop: {e}")))?;

        if !output.status.success() {
            return Err(UpdaterError::ServiceStop(format!(
                "systemctl stop {} exited {}: {}",
                self.unit,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn is_active(&self) -> Result<bool> {
        let status = Command::new("systemctl")
            .args(["is-active", "--quiet", &self.unit])
            .status()
            .map_err(|e| UpdaterError::Io(std::io::Error::other(format!(
                "systemctl is-active: {e}"
            ))))?;
        Ok(status.success())
    }
}
