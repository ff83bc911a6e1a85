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

//! Warden agent - entry point for the fleet-endpoint service
//!
//! Wires the update coordinator to its collaborators and runs the scheduled
//! check loop. When a handoff succeeds the loop exits so the spawned updater
//! can take over the install directory.

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{error, info};
use warden_agent::collab::{AgentContext, AtomicDispatchGate, ProcessLauncher};
use warden_agent::config::{self, load_config};
use warden_agent::coordinator::CheckOutcome;
use warden_agent::offer::HttpTransport;
use warden_agent::{UpdateCoordinator, VersionIgnoreStore};

/// Version from workspace Cargo.toml, injected at compile time
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity backed by the agent config file
struct FileContext {
    agent_id: String,
    install_dir: PathBuf,
}

impl AgentContext for FileContext {
    fn agent_id(&self) -> String {
        self.agent_id.clone()
    }

    fn agent_version(&self) -> String {
        VERSION.to_string()
    }

    fn install_dir(&self) -> PathBuf {
        self.install_dir.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Handle command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("Warden - managed endpoint agent");
                println!("Version: {VERSION}");
                println!();
                println!("Usage: warden-agent [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{VERSION}");
                return Ok(());
            }
            other => {
                eprintln!("Unknown option: {other}");
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("warden_agent=debug".parse().unwrap()),
        )
        .init();

    info!("Starting Warden agent {VERSION}");

    // Load config
    let config = load_config(Path::new(config::DEFAULT_CONFIG_PATH))?;
    info!(
        "Loaded config: auto_update={}, check_interval={}s, endpoint={}",
        config.auto_update, config.check_interval_secs, config.endpoint_url
    );

    let ignore = VersionIgnoreStore::open(&config.install_dir.join("ignore.json"))?;

    let context = Arc::new(FileContext {
        agent_id: config.agent_id.clone(),
        install_dir: config.install_dir.clone(),
    });
    let gate = Arc::new(AtomicDispatchGate::new());
    let transport = Arc::new(HttpTransport::new(&config.endpoint_url));
    let shutdown = Arc::new(Notify::new());

    let check_interval_secs = config.check_interval_secs;
    let coordinator = UpdateCoordinator::new(
        config,
        context,
        transport,
        gate,
        Arc::new(ProcessLauncher),
        ignore,
        shutdown.clone(),
    );

    // Set up signal handling
    tokio::spawn(async move {
        setup_signal_handlers().await;
    });

    // Main loop
    let mut check_interval = tokio::time::interval(Duration::from_secs(check_interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Shutting down");
                break;
            }
            _ = check_interval.tick() => {
                match coordinator.check_for_update(false).await {
                    // The shutdown notify is already pending; the next loop
                    // turn exits and the spawned updater takes over.
                    Ok(CheckOutcome::HandedOff) => {}
                    Ok(_) => {}
                    Err(e) => error!("Update check failed: {e}"),
                }
            }
        }
    }

    Ok(())
}

async fn setup_signal_handlers() {
    // SIGTERM handler
    unsafe {
        let handler = SigHandler::Handler(sigterm_handler);
        let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
        let _ = signal::sigaction(Signal::SIGTERM, &action);
    }

    // Keep the task alive
    loop {
        sleep(Duration::from_secs(3600)).await;
    }
}

extern "C" fn sigterm_handler(_signal: nix::libc::c_int) {
    std::process::exit(0);
}
