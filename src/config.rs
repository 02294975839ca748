// Copyright 2026 Tobin Edwards
//
//    Licensed under the Apache License, Version 2.0 (the "License");
//    you may not use this file except in compliance with the License.
//    You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
//    Unless required by applicable law or agreed to in writing, software
//    distributed under the License is distributed on an "AS IS" BASIS,
//    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//    See the License for the specific language governing permissions and
//    limitations under the License.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::analysis::Staleness;

pub const ENDPOINT_VAR: &str = "RIFF_STUDY_ENDPOINT";
pub const TIMEOUT_VAR: &str = "RIFF_STUDY_TIMEOUT_MS";
pub const STALENESS_VAR: &str = "RIFF_STUDY_STALENESS";

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("RIFF_STUDY_TIMEOUT_MS is not a number of milliseconds: {0:?}")]
    Timeout(String),
    #[error("RIFF_STUDY_STALENESS must be current-position or latest-arrival, got {0:?}")]
    Staleness(String),
}

/// Settings for the analysis backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub endpoint: String,
    /// Per-request timeout in milliseconds. `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
    pub staleness: Staleness,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: None,
            staleness: Staleness::default(),
        }
    }
}

impl StudyConfig {
    /// Reads the process environment after loading `.env`, if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds a config from a variable lookup. Unset variables keep their
    /// defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENDPOINT_VAR).filter(|s| !s.trim().is_empty()) {
            config.endpoint = endpoint.trim().to_string();
        }
        if let Some(timeout) = lookup(TIMEOUT_VAR) {
            let ms = timeout
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Timeout(timeout.clone()))?;
            config.timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(staleness) = lookup(STALENESS_VAR) {
            config.staleness = staleness
                .trim()
                .parse()
                .map_err(|_| ConfigError::Staleness(staleness.clone()))?;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
