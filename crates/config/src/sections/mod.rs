// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod redis;

pub use self::redis::RedisConfig;
use crate::util::{ConfigurationError, ConfigurationSection};

/// Application configuration root
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    /// Configuration of the Redis list holding the policy rules
    #[serde(default)]
    pub redis: RedisConfig,
}

impl ConfigurationSection for RootConfig {
    fn validate(&self, figment: &figment::Figment) -> Result<(), ConfigurationError> {
        self.redis.validate(figment)
    }
}

impl RootConfig {
    /// Generate a new configuration with the default settings, ready to be
    /// written to a file
    #[must_use]
    pub fn generate() -> Self {
        Self {
            redis: RedisConfig::generate(),
        }
    }
}
