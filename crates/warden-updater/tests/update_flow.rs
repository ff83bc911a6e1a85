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

//! End-to-end state machine tests over real temp directories
//!
//! The service manager is faked; everything else (backup, replace,
//! rollback, retention, phase markers) runs against the filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use warden_core::{HandoffManifest, PreserveList, UpdaterExit};
use warden_updater::error::Result;
use warden_updater::service::ServiceManager;
use warden_updater::updater::{PHASE_FILE, run_update};
use warden_updater::UpdaterError;

#[derive(Default)]
struct FakeState {
    active: bool,
    start_calls: u32,
    stop_calls: u32,
    /// The next N start() calls fail outright (broken new binary)
    fail_starts_remaining: u32,
    /// The next N start() calls succeed but the service dies immediately
    dead_starts_remaining: u32,
}

#[derive(Clone, Default)]
struct FakeService(Arc<Mutex<FakeState>>);

impl FakeService {
    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }
}

impl ServiceManager for FakeService {
    fn start(&self) -> Result<()> {
        let mut state = self.state();
        state.start_calls += 1;
        if state.fail_starts_remaining > 0 {
            state.fail_starts_remaining -= 1;
            return Err(UpdaterError::ServiceStart("unit failed to start".to_string()));
        }
        if state.dead_starts_remaining > 0 {
            state.dead_starts_remaining -= 1;
            state.active = false;
        } else {
            state.active = true;
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut state = self.state();
        state.stop_calls += 1;
        state.active = false;
        Ok(())
    }

    fn is_active(&self) -> Result<bool> {
        Ok(self.state().active)
    }
}

/// PID of a process that has already exited and been reaped
fn exited_pid() -> u32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

/// Relative path -> content map of a directory tree
fn tree_contents(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

/// Build an install dir, a staged package, and the manifest tying them together
fn setup(temp: &TempDir) -> HandoffManifest {
    let install_dir = temp.path().join("install");
    fs::create_dir_all(&install_dir).unwrap();
    fs::write(install_dir.join("warden-agent"), b"old binary").unwrap();
    fs::write(install_dir.join("agent.json"), b"{\"agent_id\":\"agent-7\"}").unwrap();
    fs::create_dir(install_dir.join("logs")).unwrap();
    fs::write(install_dir.join("logs/agent.log"), b"log lines").unwrap();
    fs::create_dir(install_dir.join("assets")).unwrap();
    fs::write(install_dir.join("assets/schema.json"), b"{\"v\":1}").unwrap();
    // Present on any install that has been locked before; preserved
    fs::write(install_dir.join(".warden.lock"), b"").unwrap();

    let staging = temp.path().join("staging/1.3.0");
    let package_dir = staging.join("package");
    fs::create_dir_all(&package_dir).unwrap();
    fs::write(package_dir.join("warden-agent"), b"new binary").unwrap();
    fs::create_dir(package_dir.join("assets")).unwrap();
    fs::write(package_dir.join("assets/schema.json"), b"{\"v\":2}").unwrap();

    let archive_path = staging.join("package.tar.gz");
    fs::write(&archive_path, b"archive bytes").unwrap();

    HandoffManifest {
        watched_pid: exited_pid(),
        package_dir,
        install_dir,
        backup_root: temp.path().join("backups"),
        current_version: "1.2.0".to_string(),
        new_version: "1.3.0".to_string(),
        archive_path,
        service_name: "warden-agent.service".to_string(),
        stop_timeout_secs: 5,
        watchdog_window_secs: 1,
    }
}

fn snapshot_root(backup_root: &Path) -> PathBuf {
    let mut dirs: Vec<PathBuf> = fs::read_dir(backup_root)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(dirs.len(), 1, "expected exactly one snapshot");
    dirs.pop().unwrap()
}

fn recorded_phase(snapshot: &Path) -> String {
    fs::read_to_string(snapshot.join(PHASE_FILE)).unwrap()
}

#[test]
fn test_success_path() {
    let temp = TempDir::new().unwrap();
    let manifest = setup(&temp);
    let service = FakeService::default();

    let exit = run_update(&manifest, &service, &PreserveList::agent_defaults());
    assert_eq!(exit, UpdaterExit::Success);

    // New tree deployed, preserved paths intact
    let install = &manifest.install_dir;
    assert_eq!(fs::read(install.join("warden-agent")).unwrap(), b"new binary");
    assert_eq!(
        fs::read(install.join("assets/schema.json")).unwrap(),
        b"{\"v\":2}"
    );
    assert_eq!(
        fs::read(install.join("agent.json")).unwrap(),
        b"{\"agent_id\":\"agent-7\"}"
    );
    assert_eq!(fs::read(install.join("logs/agent.log")).unwrap(), b"log lines");

    // Extraction artifacts gone, snapshot retained with its final marker
    assert!(!manifest.package_dir.exists());
    assert!(!manifest.archive_path.exists());
    let snapshot = snapshot_root(&manifest.backup_root);
    assert!(snapshot.join("tree/warden-agent").exists());
    assert!(recorded_phase(&snapshot).contains("watchdog_passed"));

    let state = service.state();
    assert_eq!(state.start_calls, 1);
    assert_eq!(state.stop_calls, 0);
    assert!(state.active);
}

#[test]
fn test_start_failure_rolls_back_byte_identical() {
    let temp = TempDir::new().unwrap();
    let manifest = setup(&temp);
    let before = tree_contents(&manifest.install_dir);

    let service = FakeService::default();
    service.state().fail_starts_remaining = 1;

    let exit = run_update(&manifest, &service, &PreserveList::agent_defaults());
    assert_eq!(exit, UpdaterExit::NewServiceStartFailed);

    // Post-rollback install is byte-identical to the pre-update tree
    assert_eq!(before, tree_contents(&manifest.install_dir));

    // The old version is running again
    let state = service.state();
    assert!(state.active);
    assert_eq!(state.start_calls, 2);

    let snapshot = snapshot_root(&manifest.backup_root);
    assert!(recorded_phase(&snapshot).contains("rolled_back"));
}

#[test]
fn test_watchdog_instability_rolls_back() {
    let temp = TempDir::new().unwrap();
    let manifest = setup(&temp);
    let before = tree_contents(&manifest.install_dir);

    let service = FakeService::default();
    // New binary starts, then exits over and over inside the window
    service.state().dead_starts_remaining = 1;

    let exit = run_update(&manifest, &service, &PreserveList::agent_defaults());
    assert_eq!(exit, UpdaterExit::WatchdogTriggeredRollback);

    assert_eq!(before, tree_contents(&manifest.install_dir));

    // The previously running version is active again
    let state = service.state();
    assert!(state.active);
    assert_eq!(state.start_calls, 2);
}

#[test]
fn test_agent_stop_timeout_leaves_install_untouched() {
    let temp = TempDir::new().unwrap();
    let mut manifest = setup(&temp);
    let before = tree_contents(&manifest.install_dir);

    // A process that will not exit within the wait window
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    manifest.watched_pid = child.id();
    manifest.stop_timeout_secs = 1;

    let service = FakeService::default();
    let exit = run_update(&manifest, &service, &PreserveList::agent_defaults());
    assert_eq!(exit, UpdaterExit::AgentStopTimeout);

    // No backup taken, no replace attempted, no service interaction
    assert!(!manifest.backup_root.exists());
    assert_eq!(before, tree_contents(&manifest.install_dir));
    let state = service.state();
    assert_eq!(state.start_calls, 0);
    assert_eq!(state.stop_calls, 0);

    child.kill().unwrap();
    child.wait().unwrap();
}

#[test]
fn test_rollback_failure_is_terminal() {
    let temp = TempDir::new().unwrap();
    let manifest = setup(&temp);

    let service = FakeService::default();
    // The new binary fails to start and so does the restored one
    service.state().fail_starts_remaining = 2;

    let exit = run_update(&manifest, &service, &PreserveList::agent_defaults());
    assert_eq!(exit, UpdaterExit::RollbackFailed);
}

#[test]
fn test_rerun_after_rollback_is_idempotent() {
    // The rollback path reuses the replace primitive; restoring twice from
    // the same snapshot must converge to the same tree.
    let temp = TempDir::new().unwrap();
    let manifest = setup(&temp);
    let before = tree_contents(&manifest.install_dir);

    let service = FakeService::default();
    service.state().fail_starts_remaining = 1;
    let exit = run_update(&manifest, &service, &PreserveList::agent_defaults());
    assert_eq!(exit, UpdaterExit::NewServiceStartFailed);

    // Manually re-run the restore direction, as an operator might
    let snapshot = snapshot_root(&manifest.backup_root);
    warden_updater::replacer::replace(
        &snapshot.join("tree"),
        &manifest.install_dir,
        &PreserveList::agent_defaults(),
    )
    .unwrap();

    assert_eq!(before, tree_contents(&manifest.install_dir));
}
