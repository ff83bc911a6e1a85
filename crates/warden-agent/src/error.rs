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

//! Error types for the agent crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config error: {0}")]
    Config(String),

    #[error("incomplete update offer: {0}")]
    InvalidOffer(String),

    #[error("version {0} is on the ignore list")]
    VersionIgnored(String),

    #[error("offered version {offered} is not newer than running version {current}")]
    NotNewer { current: String, offered: String },

    #[error("update check failed: {0}")]
    Transport(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("package extraction failed: {0}")]
    Extract(String),

    #[error("failed to launch updater: {0}")]
    Launch(String),

    #[error("state persistence error: {0}")]
    State(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] warden_core::CoreError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
