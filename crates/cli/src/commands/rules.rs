// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{fmt::Write as _, process::ExitCode};

use anyhow::Context;
use camino::Utf8PathBuf;
use casbin::Adapter;
use clap::Parser;
use cra_config::{ConfigurationSection, RedisConfig};
use cra_storage::RuleRepository;
use figment::Figment;
use tracing::{info, info_span, warn};

use crate::util::{
    adapter_from_config, parse_policy, repository_from_config, rule_from_args, write_output,
};

#[derive(Parser, Debug)]
pub(super) struct Options {
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Parser, Debug)]
enum Subcommand {
    /// Print the stored rules, one per line
    List {
        /// Only print the rules of this type
        #[arg(long)]
        ptype: Option<String>,
    },

    /// Append a rule
    Add {
        /// The rule type, like `p` or `g2`
        ptype: String,

        /// The rule values
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Remove every copy of a rule
    Remove {
        /// The rule type, like `p` or `g2`
        ptype: String,

        /// The rule values
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Remove the rules matching a filter
    ///
    /// An empty value matches any value at its position.
    RemoveFiltered {
        /// The rule type, like `p` or `g2`
        ptype: String,

        /// Position of the first value to match, between 0 and 5
        field_index: usize,

        /// The values to match, starting at `field_index`
        values: Vec<String>,
    },

    /// Replace the first copy of a rule with another one
    Update {
        /// The rule type, like `p` or `g2`
        ptype: String,

        /// The values of the rule to replace
        #[arg(long, num_args = 1.., required = true)]
        old: Vec<String>,

        /// The values of the new rule
        #[arg(long, num_args = 1.., required = true)]
        new: Vec<String>,
    },

    /// Import rules from a policy file
    ///
    /// The file has one `ptype, v0, v1, ...` rule per line.
    Import {
        /// The policy file to import
        file: Utf8PathBuf,

        /// Replace the stored rules instead of appending to them
        #[arg(long)]
        replace: bool,
    },

    /// Delete all the stored rules
    Clear,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        use Subcommand as SC;

        let config = RedisConfig::extract_or_default(figment).map_err(anyhow::Error::from_boxed)?;

        match self.subcommand {
            SC::List { ptype } => {
                let _span = info_span!("cli.rules.list").entered();
                let mut repo = repository_from_config(&config).await?;

                let rules = repo.list().await.context("could not list the rules")?;
                let mut output = String::new();
                for rule in rules
                    .iter()
                    .filter(|rule| ptype.as_ref().is_none_or(|ptype| &rule.ptype == ptype))
                {
                    writeln!(output, "{rule}")?;
                }

                write_output(None, &output).await?;
            }

            SC::Add { ptype, values } => {
                let _span = info_span!("cli.rules.add").entered();
                let rule = rule_from_args(&ptype, &values)?;
                let mut adapter = adapter_from_config(&config).await?;

                adapter
                    .add_policy(rule.section(), &ptype, rule.values())
                    .await
                    .context("could not add the rule")?;
                info!(%rule, "Rule added");
            }

            SC::Remove { ptype, values } => {
                let _span = info_span!("cli.rules.remove").entered();
                let rule = rule_from_args(&ptype, &values)?;
                let mut adapter = adapter_from_config(&config).await?;

                let removed = adapter
                    .remove_policy(rule.section(), &ptype, rule.values())
                    .await
                    .context("could not remove the rule")?;

                if removed {
                    info!(%rule, "Rule removed");
                } else {
                    warn!(%rule, "No such rule");
                }
            }

            SC::RemoveFiltered {
                ptype,
                field_index,
                values,
            } => {
                let _span = info_span!("cli.rules.remove_filtered").entered();
                let section = rule_from_args(&ptype, &[])?.section().to_owned();
                let mut adapter = adapter_from_config(&config).await?;

                let valid = adapter
                    .remove_filtered_policy(&section, &ptype, field_index, values)
                    .await
                    .context("could not remove the rules")?;

                if !valid {
                    warn!(
                        field_index,
                        "Invalid filter, the values must fit in the 6 positional fields"
                    );
                    return Ok(ExitCode::FAILURE);
                }

                info!("Matching rules removed");
            }

            SC::Update { ptype, old, new } => {
                let _span = info_span!("cli.rules.update").entered();
                let old = rule_from_args(&ptype, &old)?;
                let new = rule_from_args(&ptype, &new)?;
                let mut adapter = adapter_from_config(&config).await?;

                let replaced = adapter
                    .update_policy(old.section(), &ptype, old.values(), new.values())
                    .await
                    .context("could not update the rule")?;

                if !replaced {
                    warn!(rule = %old, "No such rule");
                    return Ok(ExitCode::FAILURE);
                }

                info!(%old, %new, "Rule updated");
            }

            SC::Import { file, replace } => {
                let _span = info_span!("cli.rules.import", %file).entered();
                let contents = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("could not read {file}"))?;
                let rules = parse_policy(&contents)
                    .with_context(|| format!("invalid policy file {file}"))?;
                let mut repo = repository_from_config(&config).await?;

                if replace {
                    repo.replace_all(&rules)
                        .await
                        .context("could not replace the rules")?;
                } else {
                    repo.append(&rules)
                        .await
                        .context("could not append the rules")?;
                }

                info!(count = rules.len(), replace, "Rules imported");
            }

            SC::Clear => {
                let _span = info_span!("cli.rules.clear").entered();
                let mut adapter = adapter_from_config(&config).await?;

                adapter
                    .drop_rules()
                    .await
                    .context("could not delete the rules")?;
                info!(key = %config.key, "Rules deleted");
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
