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

//! Update offers and the check-update transport

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const USER_AGENT: &str = concat!("warden-agent/", env!("CARGO_PKG_VERSION"));

/// Server-advertised candidate version. Received once per check and
/// discarded after processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOffer {
    pub version: String,
    pub download_url: String,
    pub checksum_sha256: String,
}

impl UpdateOffer {
    /// An offer missing any field is rejected before any state changes
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(AgentError::InvalidOffer("missing version".to_string()));
        }
        if self.download_url.trim().is_empty() {
            return Err(AgentError::InvalidOffer("missing download_url".to_string()));
        }
        if self.checksum_sha256.trim().is_empty() {
            return Err(AgentError::InvalidOffer(
                "missing checksum_sha256".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transport collaborator that asks the fleet server whether an update
/// exists for this agent
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn check_update(
        &self,
        agent_id: &str,
        current_version: &str,
    ) -> Result<Option<UpdateOffer>>;
}

#[derive(Debug, Deserialize)]
struct CheckUpdateResponse {
    #[serde(default)]
    update: Option<UpdateOffer>,
}

/// HTTP implementation of the check-update call
pub struct HttpTransport {
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UpdateTransport for HttpTransport {
    async fn check_update(
        &self,
        agent_id: &str,
        current_version: &str,
    ) -> Result<Option<UpdateOffer>> {
        let url = format!(
            "{}/agents/{agent_id}/check-update?version={current_version}",
            self.base_url
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AgentError::Transport(format!("Failed to build HTTP client: {e}")))?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("Request failed: {e}")))?;

        // Check rate limit
        if let Some(remaining) = response.headers().get("x-ratelimit-remaining")
            && let Ok(remaining_str) = remaining.to_str()
            && let Ok(remaining_int) = remaining_str.parse::<u32>()
            && remaining_int < 10
        {
            tracing::warn!("Fleet API rate limit low: {remaining_int} remaining");
        }

        if response.status().is_client_error() || response.status().is_server_error() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(AgentError::Transport(format!(
                "Fleet API error {status}: {body}"
            )));
        }

        let parsed: CheckUpdateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Transport(format!("Failed to parse response: {e}")))?;

        Ok(parsed.update)
    }
}
