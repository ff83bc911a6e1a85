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

//! Version parsing and comparison module

use crate::error::{CoreError, Result};

/// Parse semver-like version strings (e.g., "0.3.4", "v0.3.4", "0.3.4-rc.1")
///
/// Pre-release and build suffixes do not participate in ordering and are
/// stripped before the dot-separated triple is parsed.
pub fn parse_version(s: &str) -> Result<(u32, u32, u32)> {
    let s = s.trim_start_matches('v').trim_start_matches('V');
    let s = s.split(['-', '+']).next().unwrap_or(s);
    let parts: Vec<&str> = s.split('.').collect();

    if parts.len() != 3 {
        return Err(CoreError::VersionParse(format!(
            "Invalid version format: {s}, expected X.Y.Z"
        )));
    }

    let major = parts[0]
        .parse::<u32>()
        .map_err(|_| CoreError::VersionParse(format!("Invalid major version: {}", parts[0])))?;
    let minor = parts[1]
        .parse::<u32>()
        .map_err(|_| CoreError::VersionParse(format!("Invalid minor version: {}", parts[1])))?;
    let patch = parts[2]
        .parse::<u32>()
        .map_err(|_| CoreError::VersionParse(format!("Invalid patch version: {}", parts[2])))?;

    Ok((major, minor, patch))
}

/// Compare two version strings, returns true if `remote` is strictly newer
/// than `local` under segment-wise ordering
pub fn is_newer(local: &str, remote: &str) -> Result<bool> {
    let (local_major, local_minor, local_patch) = parse_version(local)?;
    let (remote_major, remote_minor, remote_patch) = parse_version(remote)?;

    if remote_major > local_major {
        return Ok(true);
    }
    if remote_major < local_major {
        return Ok(false);
    }

    if remote_minor > local_minor {
        return Ok(true);
    }
    if remote_minor < local_minor {
        return Ok(false);
    }

    Ok(remote_patch > local_patch)
}
