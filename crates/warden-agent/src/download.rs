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

//! Package downloader with SHA256 verification

use crate::error::{AgentError, Result};
use crate::offer::UpdateOffer;
use sha2::{Digest, Sha256};
use std::path::Path;

const USER_AGENT: &str = concat!("warden-agent/", env!("CARGO_PKG_VERSION"));

const MAX_RETRIES: u32 = 3;
const RETRY_DELAYS: [u64; 3] = [1, 5, 30]; // seconds

/// Download the offered package to `dest` and verify its SHA256 against the
/// offer. Transient transport failures are retried; a checksum mismatch is
/// not, since re-downloading the same broken payload cannot help.
pub async fn fetch_package(offer: &UpdateOffer, dest: &Path) -> Result<()> {
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            tracing::warn!("Retrying download (attempt {}/{MAX_RETRIES})", attempt + 1);
            tokio::time::sleep(tokio::time::Duration::from_secs(
                RETRY_DELAYS[attempt as usize - 1],
            ))
            .await;
        }

        match download_and_verify(offer, dest).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if dest.exists() {
                    let _ = std::fs::remove_file(dest);
                }
                if matches!(e, AgentError::ChecksumMismatch { .. }) {
                    return Err(e);
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AgentError::Download("No error recorded".to_string())))
}

async fn download_and_verify(offer: &UpdateOffer, dest: &Path) -> Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AgentError::Download(format!("Failed to build HTTP client: {e}")))?;

    let response = client
        .get(&offer.download_url)
        .send()
        .await
        .map_err(|e| AgentError::Download(format!("Request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(AgentError::Download(format!(
            "Download failed with status: {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AgentError::Download(format!("Failed to download bytes: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let actual = format!("{:x}", hasher.finalize());

    // Advertised checksums arrive in either case
    if !actual.eq_ignore_ascii_case(&offer.checksum_sha256) {
        return Err(AgentError::ChecksumMismatch {
            expected: offer.checksum_sha256.to_lowercase(),
            actual,
        });
    }

    std::fs::write(dest, &bytes)?;

    Ok(())
}
