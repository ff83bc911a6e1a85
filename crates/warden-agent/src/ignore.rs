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

//! Durable record of versions that failed to apply
//!
//! Consulted before acting on any offer so a broken release is not retried
//! on every check cycle. Reads are served from an in-memory cache loaded at
//! open; writes are flushed to disk before returning because the caller may
//! be a process on its way out.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoredVersion {
    pub version: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct VersionIgnoreStore {
    path: PathBuf,
    entries: Vec<IgnoredVersion>,
}

impl VersionIgnoreStore {
    /// Load the store from disk, or start empty if the file does not exist
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn is_ignored(&self, version: &str) -> bool {
        self.entries.iter().any(|e| e.version == version)
    }

    pub fn entries(&self) -> &[IgnoredVersion] {
        &self.entries
    }

    /// Append a failure record and persist it synchronously
    pub fn add(&mut self, version: &str, reason: &str) -> Result<()> {
        self.entries.push(IgnoredVersion {
            version: version.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });

        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(&self.entries)?;

        // Atomic write, fsynced: the caller may exit immediately after
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &self.path)?;

        tracing::info!("Version {version} added to ignore list: {reason}");
        Ok(())
    }
}
