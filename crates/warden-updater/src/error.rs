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

//! Error types for the updater crate

use thiserror::Error;
use warden_core::UpdaterExit;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("timed out after {waited_secs}s waiting for process {pid} to exit")]
    AgentStopTimeout { pid: u32, waited_secs: u64 },

    #[error("install lock not acquired: {0}")]
    LockHeld(String),

    #[error("backup failed: {0}")]
    Backup(String),

    #[error("deploy failed: {0}")]
    Deploy(String),

    #[error("service start failed: {0}")]
    ServiceStart(String),

    #[error("service stop failed: {0}")]
    ServiceStop(String),

    #[error("rollback failed: {0}")]
    Rollback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdaterError {
    /// Exit code reported to whatever launched this process
    pub fn exit(&self) -> UpdaterExit {
        match self {
            Self::InvalidArguments(_) => UpdaterExit::InvalidArguments,
            Self::AgentStopTimeout { .. } => UpdaterExit::AgentStopTimeout,
            Self::Backup(_) => UpdaterExit::BackupFailed,
            Self::Deploy(_) => UpdaterExit::DeployFailed,
            Self::ServiceStart(_) => UpdaterExit::NewServiceStartFailed,
            Self::ServiceStop(_) => UpdaterExit::StopAgentFailed,
            Self::Rollback(_) => UpdaterExit::RollbackFailed,
            Self::LockHeld(_) | Self::Io(_) => UpdaterExit::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_mapping() {
        assert_eq!(
            UpdaterError::AgentStopTimeout {
                pid: 1,
                waited_secs: 120
            }
            .exit(),
            UpdaterExit::AgentStopTimeout
        );
        assert_eq!(
            UpdaterError::Backup("disk full".to_string()).exit(),
            UpdaterExit::BackupFailed
        );
        assert_eq!(
            UpdaterError::Deploy("copy failed".to_string()).exit(),
            UpdaterExit::DeployFailed
        );
        assert_eq!(
            UpdaterError::ServiceStart("unit not found".to_string()).exit(),
            UpdaterExit::NewServiceStartFailed
        );
        assert_eq!(
            UpdaterError::Rollback("restore failed".to_string()).exit(),
            UpdaterExit::RollbackFailed
        );
        assert_eq!(
            UpdaterError::LockHeld("other updater".to_string()).exit(),
            UpdaterExit::GeneralError
        );
    }
}
