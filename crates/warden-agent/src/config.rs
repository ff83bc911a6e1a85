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

//! Configuration module for the agent

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/opt/warden/agent.json";

fn default_true() -> bool {
    true
}

fn default_3600() -> u64 {
    3600
}

fn default_120() -> u64 {
    120
}

fn default_endpoint() -> String {
    "https://fleet.solare.cz/api".to_string()
}

fn default_agent_id() -> String {
    "unregistered".to_string()
}

fn default_service_name() -> String {
    "warden-agent.service".to_string()
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("/opt/warden")
}

fn default_updater_bin() -> PathBuf {
    PathBuf::from("/opt/warden/warden-updater")
}

fn default_backup_root() -> PathBuf {
    PathBuf::from("/var/lib/warden/backups")
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("warden-staging")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Enable automatic updates on the scheduled check
    #[serde(default = "default_true")]
    pub auto_update: bool,

    /// How often to check for updates (seconds)
    #[serde(default = "default_3600")]
    pub check_interval_secs: u64,

    /// Fleet API base URL for the check-update call
    #[serde(default = "default_endpoint")]
    pub endpoint_url: String,

    /// Identity assigned at enrollment
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// OS service unit the updater stops/starts
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// The live install tree being updated
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Path to the updater executable handed the manifest
    #[serde(default = "default_updater_bin")]
    pub updater_bin: PathBuf,

    /// Where pre-update snapshots are kept. Must live outside the install
    /// tree so the replace pass never touches it.
    #[serde(default = "default_backup_root")]
    pub backup_root: PathBuf,

    /// Download/extraction staging area, also outside the install tree
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Max seconds the updater waits for this process to exit
    #[serde(default = "default_120")]
    pub stop_timeout_secs: u64,

    /// Seconds the updater observes the new service before declaring success
    #[serde(default = "default_120")]
    pub watchdog_window_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            auto_update: true,
            check_interval_secs: 3600,
            endpoint_url: default_endpoint(),
            agent_id: default_agent_id(),
            service_name: default_service_name(),
            install_dir: default_install_dir(),
            updater_bin: default_updater_bin(),
            backup_root: default_backup_root(),
            staging_dir: default_staging_dir(),
            stop_timeout_secs: 120,
            watchdog_window_secs: 120,
        }
    }
}

pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| AgentError::Config(format!("Failed to parse config: {e}")))
    } else {
        // Create with defaults
        let config = AgentConfig::default();
        save_config(&config, path)?;
        Ok(config)
    }
}

pub fn save_config(config: &AgentConfig, path: &Path) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(config)?;

    // Atomic write
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}
