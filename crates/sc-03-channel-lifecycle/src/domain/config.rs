//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::env;

/// Default challenge period requested for new channels (1 hour).
pub const DEFAULT_CHALLENGE_PERIOD_SECS: u64 = 3600;

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Network the ledger contract talks to.
    pub chain_id: u64,
    /// Challenge period requested for new channels, seconds.
    pub challenge_period: u64,
    /// Coordinator endpoint recorded as used after each committed operation.
    pub endpoint: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            challenge_period: DEFAULT_CHALLENGE_PERIOD_SECS,
            endpoint: "ws://localhost:8000/ws".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Create configuration from environment variables.
    ///
    /// - `SC_CHAIN_ID` (default: 1)
    /// - `SC_CHALLENGE_PERIOD_SECS` (default: 3600)
    /// - `SC_COORDINATOR_URL` (default: ws://localhost:8000/ws)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chain_id: env::var("SC_CHAIN_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chain_id),
            challenge_period: env::var("SC_CHALLENGE_PERIOD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.challenge_period),
            endpoint: env::var("SC_COORDINATOR_URL").unwrap_or(defaults.endpoint),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chain_id == 0 {
            return Err("chain_id cannot be 0".into());
        }
        if self.challenge_period == 0 {
            return Err("challenge_period cannot be 0".into());
        }
        if self.endpoint.trim().is_empty() {
            return Err("endpoint cannot be empty".into());
        }
        Ok(())
    }
}
