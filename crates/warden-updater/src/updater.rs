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

//! The update state machine
//!
//! WaitForOldProcess -> Backup -> Replace -> StartService -> Watchdog ->
//! Success | RollingBack. Failures before Backup leave the install
//! untouched; failures after Replace begins escalate to rollback through
//! the same replace primitive. A completed phase is recorded to a marker
//! file next to the snapshot so a crash mid-sequence can be located by hand;
//! the Backup->Replace->StartService span itself has no crash-consistency
//! guarantee.

use crate::error::UpdaterError;
use crate::lockfile;
use crate::procwait;
use crate::replacer::{self, BackupSnapshot};
use crate::retention::{self, RetentionPolicy};
use crate::service::ServiceManager;
use crate::watchdog::{self, Verdict};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use warden_core::{HandoffManifest, PreserveList, UpdaterExit};

pub const PHASE_FILE: &str = "phase.json";

/// Last completed phase, recorded for post-mortem inspection only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BackedUp,
    Replaced,
    ServiceStarted,
    WatchdogPassed,
    RolledBack,
}

#[derive(Serialize)]
struct PhaseRecord {
    phase: Phase,
    at: DateTime<Utc>,
}

fn record_phase(snapshot_root: &Path, phase: Phase) {
    let record = PhaseRecord {
        phase,
        at: Utc::now(),
    };
    let path = snapshot_root.join(PHASE_FILE);
    match serde_json::to_string_pretty(&record) {
        Ok(content) => {
            if let Err(e) = std::fs::write(&path, content) {
                tracing::warn!("Failed to record phase marker: {e}");
            }
        }
        Err(e) => tracing::warn!("Failed to serialize phase marker: {e}"),
    }
}

/// Drive one full update cycle; the returned exit code is the process's
/// entire interface to the outside
pub fn run_update(
    manifest: &HandoffManifest,
    service: &dyn ServiceManager,
    preserve: &PreserveList,
) -> UpdaterExit {
    tracing::info!(
        "Updating {} -> {} in {}",
        manifest.current_version,
        manifest.new_version,
        manifest.install_dir.display()
    );

    // Wait for the old agent to exit. On timeout the install is untouched.
    if let Err(e) = procwait::wait_for_exit(
        manifest.watched_pid,
        Duration::from_secs(manifest.stop_timeout_secs),
    ) {
        tracing::error!("{e}");
        return e.exit();
    }

    // Exclusive hold on the install directory for the rest of the run
    let _lock = match lockfile::acquire(&manifest.install_dir) {
        Ok(lock) => lock,
        Err(e) => {
            tracing::error!("{e}");
            return e.exit();
        }
    };

    let snapshot = match replacer::create_backup(
        &manifest.install_dir,
        &manifest.backup_root,
        &manifest.current_version,
    ) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!("Backup failed: {e}");
            return UpdaterExit::BackupFailed;
        }
    };
    record_phase(&snapshot.root, Phase::BackedUp);

    if let Err(e) = replacer::replace(&manifest.package_dir, &manifest.install_dir, preserve) {
        tracing::error!("Deploy failed: {e}");
        return roll_back(manifest, service, &snapshot, preserve, UpdaterExit::DeployFailed);
    }
    record_phase(&snapshot.root, Phase::Replaced);

    if let Err(e) = service.start() {
        tracing::error!("{e}");
        return roll_back(
            manifest,
            service,
            &snapshot,
            preserve,
            UpdaterExit::NewServiceStartFailed,
        );
    }
    record_phase(&snapshot.root, Phase::ServiceStarted);

    let window = Duration::from_secs(manifest.watchdog_window_secs);
    match watchdog::observe(service, window, watchdog_poll(window)) {
        Verdict::Stable => {}
        Verdict::Unstable { observed } => {
            tracing::error!("New service unstable: {observed} failures within the window");
            return roll_back(
                manifest,
                service,
                &snapshot,
                preserve,
                UpdaterExit::WatchdogTriggeredRollback,
            );
        }
    }
    record_phase(&snapshot.root, Phase::WatchdogPassed);

    cleanup_artifacts(manifest);

    let removed = retention::prune_backups(&manifest.backup_root, &RetentionPolicy::default());
    if !removed.is_empty() {
        tracing::info!("Pruned {} expired backup(s)", removed.len());
    }

    tracing::info!("Update to {} succeeded", manifest.new_version);
    UpdaterExit::Success
}

fn watchdog_poll(window: Duration) -> Duration {
    (window / 24).clamp(Duration::from_millis(250), Duration::from_secs(5))
}

/// Restore the snapshot and restart the old version. On success the
/// original failure code is reported; a failure here is terminal and
/// reported as `RollbackFailed`.
fn roll_back(
    manifest: &HandoffManifest,
    service: &dyn ServiceManager,
    snapshot: &BackupSnapshot,
    preserve: &PreserveList,
    failure: UpdaterExit,
) -> UpdaterExit {
    tracing::warn!("Rolling back to {}", snapshot.version);

    match restore(manifest, service, snapshot, preserve) {
        Ok(()) => {
            record_phase(&snapshot.root, Phase::RolledBack);
            tracing::warn!("Rollback to {} complete", snapshot.version);
            failure
        }
        Err(e) => {
            tracing::error!("Rollback failed, manual intervention required: {e}");
            UpdaterExit::RollbackFailed
        }
    }
}

fn restore(
    manifest: &HandoffManifest,
    service: &dyn ServiceManager,
    snapshot: &BackupSnapshot,
    preserve: &PreserveList,
) -> Result<(), UpdaterError> {
    // Stop the broken new service if it is still running
    match service.is_active() {
        Ok(true) => service.stop()?,
        Ok(false) => {}
        Err(e) => {
            tracing::warn!("Status query failed before rollback stop: {e}");
            let _ = service.stop();
        }
    }

    replacer::replace(&snapshot.tree_dir(), &manifest.install_dir, preserve)
        .map_err(|e| UpdaterError::Rollback(format!("restore copy: {e}")))?;

    service
        .start()
        .map_err(|e| UpdaterError::Rollback(format!("service start after restore: {e}")))?;

    Ok(())
}

/// Remove the staged package and archive; the agent cannot clean them up
/// because it exited before we ran
fn cleanup_artifacts(manifest: &HandoffManifest) {
    let staging = manifest.archive_path.parent();
    if let Some(staging) = staging
        && manifest.package_dir.parent() == Some(staging)
    {
        // Archive, package and handoff manifest share one staging dir
        if let Err(e) = std::fs::remove_dir_all(staging) {
            tracing::warn!("Failed to remove staging dir {}: {e}", staging.display());
        }
        return;
    }

    if manifest.package_dir.exists()
        && let Err(e) = std::fs::remove_dir_all(&manifest.package_dir)
    {
        tracing::warn!(
            "Failed to remove package dir {}: {e}",
            manifest.package_dir.display()
        );
    }
    if manifest.archive_path.exists()
        && let Err(e) = std::fs::remove_file(&manifest.archive_path)
    {
        tracing::warn!(
            "Failed to remove archive {}: {e}",
            manifest.archive_path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_poll_scales_with_window() {
        assert_eq!(
            watchdog_poll(Duration::from_secs(120)),
            Duration::from_secs(5)
        );
        assert_eq!(
            watchdog_poll(Duration::from_secs(1)),
            Duration::from_millis(250)
        );
        assert_eq!(
            watchdog_poll(Duration::from_secs(48)),
            Duration::from_secs(2)
        );
    }
}
