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

//! Warden updater - entry point
//!
//! Invoked by the agent with a single argument: the path of the handoff
//! manifest. Everything else the run needs rides in the manifest, so paths
//! with spaces never pass through shell quoting.

use std::path::Path;
use tracing::{error, info};
use warden_core::{HandoffManifest, PreserveList, UpdaterExit};
use warden_updater::SystemdService;
use warden_updater::updater::run_update;

/// Version from workspace Cargo.toml, injected at compile time
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("warden_updater=debug".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() == 2 {
        match args[1].as_str() {
            "--help" | "-h" => {
                eprintln!("warden-updater - applies a staged Warden update");
                eprintln!();
                eprintln!("Usage: warden-updater <handoff-manifest.json>");
                eprintln!();
                eprintln!("Spawned by warden-agent; not intended for interactive use.");
                eprintln!("Exit codes 0-9 are documented in the fleet runbook.");
                std::process::exit(UpdaterExit::Success.code());
            }
            "--version" | "-v" => {
                println!("{VERSION}");
                std::process::exit(UpdaterExit::Success.code());
            }
            _ => {}
        }
    } else {
        error!("Expected exactly one argument: the handoff manifest path");
        std::process::exit(UpdaterExit::InvalidArguments.code());
    }

    let manifest_path = Path::new(&args[1]);
    let manifest = match HandoffManifest::load(manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("Cannot read handoff manifest {}: {e}", manifest_path.display());
            std::process::exit(UpdaterExit::InvalidArguments.code());
        }
    };

    info!(
        "Warden updater {VERSION} starting: {} -> {}",
        manifest.current_version, manifest.new_version
    );

    let service = SystemdService::new(&manifest.service_name);
    let exit = run_update(&manifest, &service, &PreserveList::agent_defaults());

    info!("Updater finished with {exit:?} ({})", exit.code());
    std::process::exit(exit.code());
}
