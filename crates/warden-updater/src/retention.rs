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

//! Backup retention policy
//!
//! Snapshots accumulate one per update; without pruning the backup root
//! grows without bound. After a successful update the newest snapshots are
//! kept up to a count bound, and anything beyond an age bound goes too.

use crate::replacer::BackupSnapshot;
use chrono::{Duration as ChronoDuration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Newest snapshots kept regardless of age
    pub max_backups: usize,
    /// Snapshots older than this are removed even inside the count bound
    pub max_age_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_backups: 3,
            max_age_days: 14,
        }
    }
}

/// Prune the backup root according to `policy`, returning removed paths
///
/// Unreadable entries are skipped with a warning rather than failing the
/// whole pass: retention runs after a successful update and must never turn
/// that success into a failure.
pub fn prune_backups(backup_root: &Path, policy: &RetentionPolicy) -> Vec<PathBuf> {
    let mut removed = Vec::new();

    let entries = match fs::read_dir(backup_root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                "Cannot read backup root {}: {e}",
                backup_root.display()
            );
            return removed;
        }
    };

    let mut snapshots: Vec<BackupSnapshot> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match BackupSnapshot::load(&path) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => {
                tracing::warn!("Skipping unreadable backup {}: {e}", path.display());
            }
        }
    }

    // Newest first
    snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let cutoff = Utc::now() - ChronoDuration::days(policy.max_age_days);

    for (index, snapshot) in snapshots.iter().enumerate() {
        let expired = snapshot.created_at < cutoff;
        let beyond_count = index >= policy.max_backups;

        if !expired && !beyond_count {
            continue;
        }

        match fs::remove_dir_all(&snapshot.root) {
            Ok(()) => {
                tracing::info!(
                    "Removed backup {} (version {})",
                    snapshot.root.display(),
                    snapshot.version
                );
                removed.push(snapshot.root.clone());
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to remove backup {}: {e}",
                    snapshot.root.display()
                );
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replacer::{BackupMarker, MARKER_FILE, TREE_DIR};
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn plant_backup(root: &Path, name: &str, version: &str, created_at: DateTime<Utc>) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join(TREE_DIR)).unwrap();
        let marker = BackupMarker {
            version: version.to_string(),
            created_at,
        };
        fs::write(
            dir.join(MARKER_FILE),
            serde_json::to_string_pretty(&marker).unwrap(),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_count_bound() {
        let temp = TempDir::new().unwrap();
        let now = Utc::now();
        for i in 0..5 {
            plant_backup(
                temp.path(),
                &format!("b{i}"),
                &format!("1.{i}.0"),
                now - ChronoDuration::hours(i),
            );
        }

        let policy = RetentionPolicy {
            max_backups: 3,
            max_age_days: 365,
        };
        let removed = prune_backups(temp.path(), &policy);

        // The two oldest go
        assert_eq!(removed.len(), 2);
        assert!(temp.path().join("b0").exists());
        assert!(temp.path().join("b2").exists());
        assert!(!temp.path().join("b3").exists());
        assert!(!temp.path().join("b4").exists());
    }

    #[test]
    fn test_age_bound_inside_count() {
        let temp = TempDir::new().unwrap();
        let now = Utc::now();
        plant_backup(temp.path(), "recent", "1.2.0", now - ChronoDuration::days(1));
        plant_backup(temp.path(), "ancient", "1.0.0", now - ChronoDuration::days(30));

        let removed = prune_backups(temp.path(), &RetentionPolicy::default());

        assert_eq!(removed.len(), 1);
        assert!(temp.path().join("recent").exists());
        assert!(!temp.path().join("ancient").exists());
    }

    #[test]
    fn test_unreadable_entries_skipped() {
        let temp = TempDir::new().unwrap();
        // Directory without a marker file
        fs::create_dir(temp.path().join("not-a-backup")).unwrap();
        plant_backup(temp.path(), "good", "1.2.0", Utc::now());

        let removed = prune_backups(temp.path(), &RetentionPolicy::default());

        assert!(removed.is_empty());
        assert!(temp.path().join("not-a-backup").exists());
        assert!(temp.path().join("good").exists());
    }

    #[test]
    fn test_missing_root_is_harmless() {
        let temp = TempDir::new().unwrap();
        let removed = prune_backups(&temp.path().join("absent"), &RetentionPolicy::default());
        assert!(removed.is_empty());
    }
}
