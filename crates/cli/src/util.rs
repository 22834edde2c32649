// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use anyhow::Context;
use camino::Utf8PathBuf;
use cra_adapter::RuleAdapter;
use cra_config::RedisConfig;
use cra_data_model::CasbinRule;
use cra_storage_redis::RedisRuleRepository;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Open a connection to the Redis list from the configuration
pub async fn repository_from_config(config: &RedisConfig) -> anyhow::Result<RedisRuleRepository> {
    cra_adapter::repository_from_config(config)
        .await
        .context("could not connect to Redis")
}

/// Create an adapter on the Redis list from the configuration
pub async fn adapter_from_config(config: &RedisConfig) -> anyhow::Result<RuleAdapter> {
    let repo = repository_from_config(config).await?;
    Ok(RuleAdapter::new(repo))
}

/// Build a rule from command line arguments
pub fn rule_from_args(ptype: &str, values: &[String]) -> anyhow::Result<CasbinRule> {
    CasbinRule::new(ptype, values.iter().cloned())
        .with_context(|| format!("invalid rule of type {ptype:?}"))
}

/// Parse a policy file, one `ptype, v0, v1, ...` rule per line
///
/// Blank lines and `#` comments are skipped.
pub fn parse_policy(contents: &str) -> anyhow::Result<Vec<CasbinRule>> {
    let mut rules = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let rule = CasbinRule::parse_line(line)
            .with_context(|| format!("invalid rule on line {}", number + 1))?;
        if let Some(rule) = rule {
            anyhow::ensure!(
                !rule.ptype.is_empty(),
                "missing rule type on line {}",
                number + 1
            );
            rules.push(rule);
        }
    }

    Ok(rules)
}

/// Write to the given file, or to the standard output
pub async fn write_output(output: Option<Utf8PathBuf>, contents: &str) -> anyhow::Result<()> {
    if let Some(output) = output {
        info!("Writing to {output:?}");
        let mut file = tokio::fs::File::create(&output)
            .await
            .with_context(|| format!("could not create {output}"))?;
        file.write_all(contents.as_bytes()).await?;
    } else {
        info!("Writing to standard output");
        let mut stdout = tokio::io::stdout();
        stdout.write_all(contents.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}
