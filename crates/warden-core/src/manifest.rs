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

//! Handoff manifest passed from the agent to the updater process
//!
//! The coordinator writes this file once, then launches the updater with the
//! manifest path as its single argument. Passing a file instead of bare CLI
//! arguments keeps paths with spaces (or any other shell-hostile content)
//! intact across the process boundary. The manifest is read-only for the
//! updater's entire run.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_stop_timeout_secs() -> u64 {
    120
}

fn default_watchdog_window_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffManifest {
    /// PID of the agent process that wrote this manifest. The updater waits
    /// for it to exit before touching any files.
    pub watched_pid: u32,

    /// Extracted new-version tree, used as the replace source
    pub package_dir: PathBuf,

    /// The live install directory being replaced
    pub install_dir: PathBuf,

    /// Where pre-update snapshots are kept
    pub backup_root: PathBuf,

    /// Version currently installed
    pub current_version: String,

    /// Version being deployed
    pub new_version: String,

    /// The originally downloaded archive, deleted on success
    pub archive_path: PathBuf,

    /// OS service unit to stop/start/observe
    pub service_name: String,

    /// Max seconds to wait for `watched_pid` to exit
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Seconds the new service is observed before the update counts as good
    #[serde(default = "default_watchdog_window_secs")]
    pub watchdog_window_secs: u64,
}

impl HandoffManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)?;

        // Atomic write
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> HandoffManifest {
        HandoffManifest {
            watched_pid: 4242,
            package_dir: PathBuf::from("/tmp/warden-staging/1.3.0/package"),
            install_dir: PathBuf::from("/opt/warden"),
            backup_root: PathBuf::from("/var/lib/warden/backups"),
            current_version: "1.2.0".to_string(),
            new_version: "1.3.0".to_string(),
            archive_path: PathBuf::from("/tmp/warden-staging/1.3.0/package.tar.gz"),
            service_name: "warden-agent.service".to_string(),
            stop_timeout_secs: 120,
            watchdog_window_secs: 120,
        }
    }

    #[test]
    fn test_manifest_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("handoff.json");

        let manifest = sample();
        manifest.save(&path).unwrap();

        let loaded = HandoffManifest::load(&path).unwrap();
        assert_eq!(loaded.watched_pid, manifest.watched_pid);
        assert_eq!(loaded.package_dir, manifest.package_dir);
        assert_eq!(loaded.install_dir, manifest.install_dir);
        assert_eq!(loaded.backup_root, manifest.backup_root);
        assert_eq!(loaded.current_version, manifest.current_version);
        assert_eq!(loaded.new_version, manifest.new_version);
        assert_eq!(loaded.archive_path, manifest.archive_path);
        assert_eq!(loaded.service_name, manifest.service_name);
    }

    #[test]
    fn test_manifest_survives_paths_with_spaces() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("handoff.json");

        let mut manifest = sample();
        manifest.install_dir = PathBuf::from("/opt/Program Files/warden agent");
        manifest.save(&path).unwrap();

        let loaded = HandoffManifest::load(&path).unwrap();
        assert_eq!(loaded.install_dir, manifest.install_dir);
    }

    #[test]
    fn test_timeout_defaults_apply() {
        let json = r#"{
            "watched_pid": 1,
            "package_dir": "/p",
            "install_dir": "/i",
            "backup_root": "/b",
            "current_version": "1.0.0",
            "new_version": "1.0.1",
            "archive_path": "/a.tar.gz",
            "service_name": "warden-agent.service"
        }"#;
        let manifest: HandoffManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.stop_timeout_secs, 120);
        assert_eq!(manifest.watchdog_window_secs, 120);
    }

    #[test]
    fn test_atomic_save_leaves_no_tmp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("handoff.json");

        sample().save(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = HandoffManifest::load(&temp_dir.path().join("absent.json"));
        assert!(result.is_err());
    }
}
