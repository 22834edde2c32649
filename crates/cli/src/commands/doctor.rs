// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Diagnostic utility to check the Redis server and the stored rules

use std::process::ExitCode;

use clap::Parser;
use cra_config::{ConfigurationSection, RedisConfig};
use cra_data_model::CasbinRule;
use cra_storage::TOMBSTONE;
use figment::Figment;
use tracing::{error, info, info_span, warn};

use crate::util::repository_from_config;

#[derive(Parser, Debug)]
pub(super) struct Options {}

/// What a scan of the stored list found
#[derive(Debug, Default, PartialEq, Eq)]
struct Report {
    rules: usize,
    tombstones: usize,
    malformed: Vec<usize>,
}

impl Report {
    fn scan(entries: &[String]) -> Self {
        let mut report = Self::default();
        for (index, entry) in entries.iter().enumerate() {
            if entry == TOMBSTONE {
                report.tombstones += 1;
            } else if CasbinRule::decode(entry).is_ok() {
                report.rules += 1;
            } else {
                report.malformed.push(index);
            }
        }
        report
    }
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let _span = info_span!("cli.doctor").entered();
        info!("💡 Running diagnostics on the Redis server and the stored rules");

        let config = RedisConfig::extract_or_default(figment).map_err(anyhow::Error::from_boxed)?;

        let mut repo = match repository_from_config(&config).await {
            Ok(repo) => repo,
            Err(e) => {
                error!(
                    error = &*e as &dyn std::error::Error,
                    "❌ Could not connect to Redis. Check the `redis` section of the configuration"
                );
                return Ok(ExitCode::FAILURE);
            }
        };

        if let Err(e) = repo.ping().await {
            error!(
                error = &e as &dyn std::error::Error,
                "❌ The Redis server did not answer to PING"
            );
            return Ok(ExitCode::FAILURE);
        }
        info!("✅ The Redis server is reachable");

        let entries = match repo.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    error = &e as &dyn std::error::Error,
                    key = %config.key,
                    "❌ Could not read the list. Is the key holding something else than a list?"
                );
                return Ok(ExitCode::FAILURE);
            }
        };

        let report = Report::scan(&entries);
        info!(
            key = %config.key,
            rules = report.rules,
            "✅ Found {} rules",
            report.rules
        );

        if report.tombstones > 0 {
            warn!(
                tombstones = report.tombstones,
                "⚠️ The list holds leftovers of an interrupted removal. They are ignored when loading, and purged by the next removal"
            );
        }

        if !report.malformed.is_empty() {
            for index in &report.malformed {
                error!(index, "❌ The list element at index {index} is not a valid rule");
            }
            return Ok(ExitCode::FAILURE);
        }

        info!("✅ All the stored rules are valid");
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan() {
        let entries = vec![
            r#"{"ptype":"p","v0":"alice","v1":"data1","v2":"read"}"#.to_owned(),
            TOMBSTONE.to_owned(),
            "not json".to_owned(),
            r#"{"ptype":"g","v0":"alice","v1":"admin"}"#.to_owned(),
            r#"{"v0":"alice"}"#.to_owned(),
        ];

        assert_eq!(
            Report::scan(&entries),
            Report {
                rules: 2,
                tombstones: 1,
                malformed: vec![2, 4],
            }
        );
    }
}
