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

//! Package archive extraction

use crate::error::{AgentError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;

/// Extract a downloaded .tar.gz package into a fresh directory
///
/// Any previous content at `dest` is discarded first, so a re-run after a
/// failed attempt starts clean.
pub fn extract_package(archive: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::create_dir_all(dest)?;

    let file = File::open(archive)
        .map_err(|e| AgentError::Extract(format!("Failed to open {}: {e}", archive.display())))?;
    let decoder = GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);

    tar.unpack(dest)
        .map_err(|e| AgentError::Extract(format!("Failed to unpack archive: {e}")))?;

    if std::fs::read_dir(dest)?.next().is_none() {
        return Err(AgentError::Extract(
            "Archive contained no entries".to_string(),
        ));
    }

    tracing::info!(
        "Extracted {} into {}",
        archive.display(),
        dest.display()
    );

    Ok(())
}
