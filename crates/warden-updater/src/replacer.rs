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

//! Backup, replace and restore primitives for the install tree
//!
//! `replace` is used twice per failed update: forward with the extracted
//! package as source, and backward with the backup tree as source. It must
//! therefore be idempotent: running it twice with the same arguments yields
//! the same target tree.
//!
//! File operations retry with backoff because the just-exited agent process
//! may still be releasing handles on its own files.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use warden_core::PreserveList;

const COPY_RETRIES: u32 = 5;

pub const MARKER_FILE: &str = "backup.json";
pub const TREE_DIR: &str = "tree";

/// Version marker written next to the copied tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMarker {
    pub version: String,
    pub created_at: DateTime<Utc>,
}

/// A pre-update snapshot on disk: `<root>/backup.json` + `<root>/tree/`
///
/// The marker sits beside the tree, not inside it, so a restore from `tree/`
/// reproduces the install byte-identically without the marker leaking in.
#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub root: PathBuf,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

impl BackupSnapshot {
    pub fn tree_dir(&self) -> PathBuf {
        self.root.join(TREE_DIR)
    }

    /// Read a snapshot back from its marker file
    pub fn load(root: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(root.join(MARKER_FILE))?;
        let marker: BackupMarker = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            version: marker.version,
            created_at: marker.created_at,
        })
    }
}

/// Create a timestamped full copy of the install directory
///
/// Preserved paths are included too: a rollback must be able to restore
/// everything, and the preserve-list keeps them untouched on the way back.
pub fn create_backup(
    install_dir: &Path,
    backup_root: &Path,
    version: &str,
) -> io::Result<BackupSnapshot> {
    let created_at = Utc::now();
    let timestamp = created_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let root = backup_root.join(&timestamp);

    // Remove old backup if exists
    if root.exists() {
        fs::remove_dir_all(&root)?;
    }

    let tree = root.join(TREE_DIR);
    copy_tree(install_dir, &tree)?;

    let marker = BackupMarker {
        version: version.to_string(),
        created_at,
    };
    let content = serde_json::to_string_pretty(&marker)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(root.join(MARKER_FILE), content)?;

    tracing::info!("Created backup at {}", root.display());

    Ok(BackupSnapshot {
        root,
        version: version.to_string(),
        created_at,
    })
}

/// Delete-then-copy replace of `target` from `source`
///
/// Every top-level entry of `target` not on the preserve-list is deleted,
/// then every non-preserved entry of `source` is copied in, directories
/// first. Preserved paths are never deleted and never overwritten, in
/// either direction.
pub fn replace(source: &Path, target: &Path, preserve: &PreserveList) -> io::Result<()> {
    fs::create_dir_all(target)?;

    for entry in fs::read_dir(target)? {
        let entry = entry?;
        if preserve.contains(&entry.file_name()) {
            continue;
        }
        remove_entry_with_retry(&entry.path())?;
    }

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let name = entry.file_name();
        if preserve.contains(&name) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = target.join(&name);

        if src_path.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            copy_file_with_retry(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    // Destination directories exist at every level before any file is
    // copied, so a partial tree never fails on a missing parent.
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            copy_file_with_retry(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

fn copy_file_with_retry(src: &Path, dst: &Path) -> io::Result<()> {
    retry_io(|| fs::copy(src, dst).map(|_| ()))
}

fn remove_entry_with_retry(path: &Path) -> io::Result<()> {
    retry_io(|| {
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    })
}

fn retry_io<F>(mut op: F) -> io::Result<()>
where
    F: FnMut() -> io::Result<()>,
{
    let mut last_err = None;
    for attempt in 0..=COPY_RETRIES {
        match op() {
            Ok(()) => return Ok(()),
            Err(e) => {
                last_err = Some(e);
                if attempt < COPY_RETRIES {
                    // 50ms, 100ms, 200ms, 400ms, 800ms
                    let wait_ms = 50u64 * (1 << attempt);
                    std::thread::sleep(Duration::from_millis(wait_ms));
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("retry without error")))
}
