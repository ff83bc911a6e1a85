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

//! Post-start stability watchdog
//!
//! The freshly started service is observed for a fixed window. The service
//! manager exposes no push-style exit notification, so liveness is sampled
//! on a polling loop; every sample that finds the service down counts
//! toward the instability threshold.

use crate::service::ServiceManager;
use std::time::{Duration, Instant};

/// Down-samples within the window before the update is declared unstable
pub const FAILURE_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The service stayed up through the whole window
    Stable,
    /// Repeated down observations within the window
    Unstable { observed: u32 },
}

/// Observe `service` for `window`, sampling every `poll`
pub fn observe(service: &dyn ServiceManager, window: Duration, poll: Duration) -> Verdict {
    tracing::info!(
        "Watching service stability for {}s",
        window.as_secs()
    );

    let start = Instant::now();
    let mut failures = 0u32;

    loop {
        let elapsed = start.elapsed();
        if elapsed >= window {
            tracing::info!("Service stable through watchdog window");
            return Verdict::Stable;
        }

        let remaining = window - elapsed;
        std::thread::sleep(poll.min(remaining));

        let down = match service.is_active() {
            Ok(active) => !active,
            // A failed status query cannot confirm health
            Err(e) => {
                tracing::warn!("Service status query failed: {e}");
                true
            }
        };

        if down {
            failures += 1;
            tracing::warn!(
                "Service down during watchdog window ({failures}/{FAILURE_LIMIT})"
            );
            if failures >= FAILURE_LIMIT {
                return Verdict::Unstable { observed: failures };
            }
        }
    }
}
