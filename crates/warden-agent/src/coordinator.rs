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

//! Update coordination inside the live agent process
//!
//! The coordinator validates an offer, stages the package, and hands off to
//! a freshly spawned updater process. After a successful handoff the agent
//! stops itself; the updater waits for that exit before touching the install
//! directory. On any abort the staged files are removed, the offered version
//! is recorded to the ignore list, and the agent keeps running its current
//! version.

use crate::archive::extract_package;
use crate::collab::{AgentContext, DispatchGate, UpdaterLauncher};
use crate::config::AgentConfig;
use crate::download::fetch_package;
use crate::error::{AgentError, Result};
use crate::ignore::VersionIgnoreStore;
use crate::offer::{UpdateOffer, UpdateTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use warden_core::{HandoffManifest, is_newer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Auto-update disabled and the check was not manual
    Disabled,
    /// No offer, or the offered version did not pass gating
    UpToDate,
    /// Another update cycle holds the permit; this offer was dropped
    AlreadyInProgress,
    /// Updater spawned; the agent is about to stop
    HandedOff,
}

pub struct UpdateCoordinator {
    config: AgentConfig,
    context: Arc<dyn AgentContext>,
    transport: Arc<dyn UpdateTransport>,
    gate: Arc<dyn DispatchGate>,
    launcher: Arc<dyn UpdaterLauncher>,
    ignore: Mutex<VersionIgnoreStore>,
    // Held for the whole of process_offer: at most one cycle per agent
    // process lifetime, concurrent offers are dropped rather than queued.
    in_flight: Mutex<()>,
    shutdown: Arc<Notify>,
}

impl UpdateCoordinator {
    pub fn new(
        config: AgentConfig,
        context: Arc<dyn AgentContext>,
        transport: Arc<dyn UpdateTransport>,
        gate: Arc<dyn DispatchGate>,
        launcher: Arc<dyn UpdaterLauncher>,
        ignore: VersionIgnoreStore,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            config,
            context,
            transport,
            gate,
            launcher,
            ignore: Mutex::new(ignore),
            in_flight: Mutex::new(()),
            shutdown,
        }
    }

    /// Scheduled or operator-requested update check
    pub async fn check_for_update(&self, manual: bool) -> Result<CheckOutcome> {
        if !self.config.auto_update && !manual {
            tracing::debug!("Auto-update disabled, skipping check");
            return Ok(CheckOutcome::Disabled);
        }

        if self.in_flight.try_lock().is_err() {
            tracing::warn!("Update already in progress, skipping check");
            return Ok(CheckOutcome::AlreadyInProgress);
        }

        let current = self.context.agent_version();
        let offer = self
            .transport
            .check_update(&self.context.agent_id(), &current)
            .await?;

        match offer {
            Some(offer) => self.process_offer(offer).await,
            None => {
                tracing::info!("No update available (current: {current})");
                Ok(CheckOutcome::UpToDate)
            }
        }
    }

    /// Act on a single offer: validate, stage, hand off
    pub async fn process_offer(&self, offer: UpdateOffer) -> Result<CheckOutcome> {
        let Ok(_permit) = self.in_flight.try_lock() else {
            tracing::warn!(
                "Update already in progress, dropping offer for {}",
                offer.version
            );
            return Ok(CheckOutcome::AlreadyInProgress);
        };

        offer.validate()?;

        if self.ignore.lock().await.is_ignored(&offer.version) {
            tracing::warn!(
                "Offer for {} ignored: version previously failed to apply",
                offer.version
            );
            return Err(AgentError::VersionIgnored(offer.version));
        }

        let current = self.context.agent_version();
        if !is_newer(&current, &offer.version)? {
            return Err(AgentError::NotNewer {
                current,
                offered: offer.version,
            });
        }

        tracing::info!(
            "New version available: {} (current: {current})",
            offer.version
        );

        // From here on new command dispatch is blocked
        self.gate.enter_updating();

        let staging = self.config.staging_dir.join(&offer.version);
        match self.stage_and_launch(&offer, &current, &staging).await {
            Ok(()) => {
                tracing::info!("Handoff complete, stopping agent for update");
                self.shutdown.notify_one();
                Ok(CheckOutcome::HandedOff)
            }
            Err(e) => {
                tracing::error!("Update to {} aborted: {e}", offer.version);
                if let Err(store_err) = self
                    .ignore
                    .lock()
                    .await
                    .add(&offer.version, &e.to_string())
                {
                    tracing::error!("Failed to record ignored version: {store_err}");
                }
                self.gate.resume();
                if staging.exists()
                    && let Err(cleanup_err) = std::fs::remove_dir_all(&staging)
                {
                    tracing::warn!(
                        "Failed to clean staging dir {}: {cleanup_err}",
                        staging.display()
                    );
                }
                Err(e)
            }
        }
    }

    async fn stage_and_launch(
        &self,
        offer: &UpdateOffer,
        current_version: &str,
        staging: &Path,
    ) -> Result<()> {
        std::fs::create_dir_all(staging)?;

        let archive_path = staging.join("package.tar.gz");
        tracing::info!("Downloading version {}", offer.version);
        fetch_package(offer, &archive_path).await?;
        tracing::info!("Package downloaded and verified");

        let package_dir = staging.join("package");
        extract_package(&archive_path, &package_dir)?;

        let manifest = HandoffManifest {
            watched_pid: std::process::id(),
            package_dir,
            install_dir: self.context.install_dir(),
            backup_root: self.config.backup_root.clone(),
            current_version: current_version.to_string(),
            new_version: offer.version.clone(),
            archive_path,
            service_name: self.config.service_name.clone(),
            stop_timeout_secs: self.config.stop_timeout_secs,
            watchdog_window_secs: self.config.watchdog_window_secs,
        };
        let manifest_path = staging.join("handoff.json");
        manifest.save(&manifest_path)?;

        let pid = self
            .launcher
            .launch(&self.config.updater_bin, &manifest_path)?;
        tracing::info!("Updater launched (pid {pid})");

        Ok(())
    }

    /// Path of the staging directory a given version would use
    pub fn staging_dir_for(&self, version: &str) -> PathBuf {
        self.config.staging_dir.join(version)
    }
}
