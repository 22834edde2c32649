// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use casbin::{Adapter, Filter, Model, Result, error::AdapterError};
use cra_config::RedisConfig;
use cra_data_model::{CasbinRule, FieldFilter, PolicyFilter};
use cra_storage::RuleRepository;
use cra_storage_redis::RedisRuleRepository;

use crate::{ConnectError, repository_from_config};

fn adapter_error<E>(err: E) -> casbin::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    AdapterError(Box::new(err)).into()
}

fn to_rule<I, S>(ptype: &str, values: I) -> Result<CasbinRule>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CasbinRule::new(ptype, values).map_err(adapter_error)
}

/// Insert a stored rule in the model, if the model knows its type
fn load_rule(m: &mut dyn Model, rule: CasbinRule) {
    let assertion = m
        .get_mut_model()
        .get_mut(rule.section())
        .and_then(|assertions| assertions.get_mut(&rule.ptype));

    let Some(assertion) = assertion else {
        tracing::debug!(ptype = %rule.ptype, "Skipping rule with a type unknown to the model");
        return;
    };

    assertion.get_mut_policy().insert(rule.into_values());
}

/// A [`casbin::Adapter`] backed by a [`RuleRepository`]
///
/// Rules are stored in insertion order, duplicates included. The adapter
/// remembers whether the last load was filtered, so that the enforcer can
/// refuse to save a partial policy over the full one.
pub struct RuleAdapter<R = RedisRuleRepository> {
    repo: R,
    is_filtered: bool,
}

impl RuleAdapter {
    /// Connect to the Redis server described by the configuration
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] if the connection can't be established
    pub async fn connect(config: &RedisConfig) -> std::result::Result<Self, ConnectError> {
        let repo = repository_from_config(config).await?;
        Ok(Self::new(repo))
    }
}

impl<R> RuleAdapter<R> {
    /// Create an adapter on top of an existing repository
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            is_filtered: false,
        }
    }

    /// Consume the adapter, returning the underlying repository
    pub fn into_inner(self) -> R {
        self.repo
    }
}

impl<R> RuleAdapter<R>
where
    R: RuleRepository,
    R::Error: std::error::Error + Send + Sync + 'static,
{
    /// Replace the first stored rule equal to `old_rule` with `new_rule`
    ///
    /// Returns `true` if a rule was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails, or if a rule has too many
    /// fields
    #[tracing::instrument(
        name = "adapter.update_policy",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype),
        err,
    )]
    pub async fn update_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rule: Vec<String>,
        new_rule: Vec<String>,
    ) -> Result<bool> {
        let old_rule = to_rule(ptype, old_rule)?;
        let new_rule = to_rule(ptype, new_rule)?;

        self.repo
            .replace(&old_rule, &new_rule)
            .await
            .map_err(adapter_error)
    }

    /// Replace each of `old_rules` with the rule at the same position in
    /// `new_rules`
    ///
    /// Returns `true` only if every pair replaced a stored rule. Nothing is
    /// touched if the two lists have different lengths.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails, or if a rule has too many
    /// fields
    #[tracing::instrument(
        name = "adapter.update_policies",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype, policy.count = old_rules.len()),
        err,
    )]
    pub async fn update_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        old_rules: Vec<Vec<String>>,
        new_rules: Vec<Vec<String>>,
    ) -> Result<bool> {
        if old_rules.len() != new_rules.len() {
            tracing::warn!(
                old = old_rules.len(),
                new = new_rules.len(),
                "Refusing to update policies with mismatched lengths"
            );
            return Ok(false);
        }

        let pairs = old_rules
            .into_iter()
            .zip(new_rules)
            .map(|(old, new)| -> Result<_> { Ok((to_rule(ptype, old)?, to_rule(ptype, new)?)) })
            .collect::<Result<Vec<_>>>()?;

        let mut all_replaced = true;
        for (old, new) in &pairs {
            let replaced = self.repo.replace(old, new).await.map_err(adapter_error)?;
            all_replaced &= replaced;
        }

        Ok(all_replaced)
    }

    /// Remove the rules matching the filter, then append `new_rules`
    ///
    /// Returns `false` without touching anything if the filter is invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails, or if a rule has too many
    /// fields
    #[tracing::instrument(
        name = "adapter.update_filtered_policies",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype, policy.field_index = field_index),
        err,
    )]
    pub async fn update_filtered_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        new_rules: Vec<Vec<String>>,
        field_index: usize,
        field_values: Vec<String>,
    ) -> Result<bool> {
        let filter = match FieldFilter::new(field_index, field_values) {
            Ok(filter) => filter,
            Err(e) => {
                tracing::debug!(error = &e as &dyn std::error::Error, "Invalid filter");
                return Ok(false);
            }
        };

        let new_rules = new_rules
            .into_iter()
            .map(|rule| to_rule(ptype, rule))
            .collect::<Result<Vec<_>>>()?;

        self.repo
            .remove_filtered(ptype, &filter)
            .await
            .map_err(adapter_error)?;
        self.repo.append(&new_rules).await.map_err(adapter_error)?;

        Ok(true)
    }

    /// Delete every stored rule
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails
    #[tracing::instrument(name = "adapter.drop_rules", skip_all, err)]
    pub async fn drop_rules(&mut self) -> Result<()> {
        self.repo.clear().await.map_err(adapter_error)
    }
}

#[async_trait]
impl<R> Adapter for RuleAdapter<R>
where
    R: RuleRepository,
    R::Error: std::error::Error + Send + Sync + 'static,
{
    #[tracing::instrument(name = "adapter.load_policy", skip_all, err)]
    async fn load_policy(&mut self, m: &mut dyn Model) -> Result<()> {
        let rules = self.repo.list().await.map_err(adapter_error)?;
        for rule in rules {
            load_rule(m, rule);
        }

        self.is_filtered = false;
        Ok(())
    }

    #[tracing::instrument(name = "adapter.load_filtered_policy", skip_all, err)]
    async fn load_filtered_policy<'a>(&mut self, m: &mut dyn Model, f: Filter<'a>) -> Result<()> {
        let filter = PolicyFilter {
            p: f.p.into_iter().map(ToOwned::to_owned).collect(),
            g: f.g.into_iter().map(ToOwned::to_owned).collect(),
        };

        let rules = self.repo.list().await.map_err(adapter_error)?;
        for rule in rules.into_iter().filter(|rule| filter.matches(rule)) {
            load_rule(m, rule);
        }

        self.is_filtered = true;
        Ok(())
    }

    #[tracing::instrument(name = "adapter.save_policy", skip_all, err)]
    async fn save_policy(&mut self, m: &mut dyn Model) -> Result<()> {
        let mut rules = Vec::new();

        for sec in ["p", "g"] {
            let Some(assertions) = m.get_model().get(sec) else {
                continue;
            };

            let mut assertions: Vec<_> = assertions.iter().collect();
            assertions.sort_by(|(a, _), (b, _)| a.cmp(b));

            for (ptype, assertion) in assertions {
                for rule in assertion.get_policy() {
                    rules.push(to_rule(ptype, rule)?);
                }
            }
        }

        tracing::info!(rules.count = rules.len(), "Saving the policy");
        self.repo.replace_all(&rules).await.map_err(adapter_error)
    }

    #[tracing::instrument(name = "adapter.clear_policy", skip_all, err)]
    async fn clear_policy(&mut self) -> Result<()> {
        self.repo.clear().await.map_err(adapter_error)
    }

    fn is_filtered(&self) -> bool {
        self.is_filtered
    }

    #[tracing::instrument(
        name = "adapter.add_policy",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype),
        err,
    )]
    async fn add_policy(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> Result<bool> {
        let rule = to_rule(ptype, rule)?;
        self.repo.append(&[rule]).await.map_err(adapter_error)?;
        Ok(true)
    }

    #[tracing::instrument(
        name = "adapter.add_policies",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype, policy.count = rules.len()),
        err,
    )]
    async fn add_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<bool> {
        let rules = rules
            .into_iter()
            .map(|rule| to_rule(ptype, rule))
            .collect::<Result<Vec<_>>>()?;

        self.repo.append(&rules).await.map_err(adapter_error)?;
        Ok(true)
    }

    #[tracing::instrument(
        name = "adapter.remove_policy",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype),
        err,
    )]
    async fn remove_policy(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> Result<bool> {
        if rule.is_empty() {
            return Ok(false);
        }

        let rule = to_rule(ptype, rule)?;
        let removed = self.repo.remove(&rule).await.map_err(adapter_error)?;
        Ok(removed > 0)
    }

    #[tracing::instrument(
        name = "adapter.remove_policies",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype, policy.count = rules.len()),
        err,
    )]
    async fn remove_policies(
        &mut self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<bool> {
        let rules = rules
            .into_iter()
            .filter(|rule| !rule.is_empty())
            .map(|rule| to_rule(ptype, rule))
            .collect::<Result<Vec<_>>>()?;

        let mut removed = 0;
        for rule in &rules {
            removed += self.repo.remove(rule).await.map_err(adapter_error)?;
        }

        Ok(removed > 0)
    }

    #[tracing::instrument(
        name = "adapter.remove_filtered_policy",
        skip_all,
        fields(policy.section = sec, policy.ptype = ptype, policy.field_index = field_index),
        err,
    )]
    async fn remove_filtered_policy(
        &mut self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> Result<bool> {
        let filter = match FieldFilter::new(field_index, field_values) {
            Ok(filter) => filter,
            Err(e) => {
                tracing::debug!(error = &e as &dyn std::error::Error, "Invalid filter");
                return Ok(false);
            }
        };

        self.repo
            .remove_filtered(ptype, &filter)
            .await
            .map_err(adapter_error)?;

        Ok(true)
    }
}
