// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use cra_data_model::{CasbinRule, FieldFilter};
use thiserror::Error;

use crate::RuleRepository;

/// A type-erased [`RuleRepository`], with a type-erased error
pub type BoxRuleRepository = Box<dyn RuleRepository<Error = RepositoryError> + Send + Sync + 'static>;

/// A type-erased error that can be returned by repository operations
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RepositoryError {
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl RepositoryError {
    /// Construct a [`RepositoryError`] from any error kind
    pub fn from_error<E>(value: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(value),
        }
    }
}

/// Wraps a repository, turning its errors into [`RepositoryError`]s
pub(crate) struct Erased<R>(pub(crate) R);

#[async_trait]
impl<R> RuleRepository for Erased<R>
where
    R: RuleRepository,
    R::Error: std::error::Error + Send + Sync + 'static,
{
    type Error = RepositoryError;

    async fn list(&mut self) -> Result<Vec<CasbinRule>, Self::Error> {
        self.0.list().await.map_err(RepositoryError::from_error)
    }

    async fn count(&mut self) -> Result<usize, Self::Error> {
        self.0.count().await.map_err(RepositoryError::from_error)
    }

    async fn append(&mut self, rules: &[CasbinRule]) -> Result<usize, Self::Error> {
        self.0
            .append(rules)
            .await
            .map_err(RepositoryError::from_error)
    }

    async fn remove(&mut self, rule: &CasbinRule) -> Result<usize, Self::Error> {
        self.0.remove(rule).await.map_err(RepositoryError::from_error)
    }

    async fn remove_filtered(
        &mut self,
        ptype: &str,
        filter: &FieldFilter,
    ) -> Result<usize, Self::Error> {
        self.0
            .remove_filtered(ptype, filter)
            .await
            .map_err(RepositoryError::from_error)
    }

    async fn replace(&mut self, old: &CasbinRule, new: &CasbinRule) -> Result<bool, Self::Error> {
        self.0
            .replace(old, new)
            .await
            .map_err(RepositoryError::from_error)
    }

    async fn replace_all(&mut self, rules: &[CasbinRule]) -> Result<(), Self::Error> {
        self.0
            .replace_all(rules)
            .await
            .map_err(RepositoryError::from_error)
    }

    async fn clear(&mut self) -> Result<(), Self::Error> {
        self.0.clear().await.map_err(RepositoryError::from_error)
    }
}

/// Lets a [`BoxRuleRepository`] stand wherever a repository is expected
#[async_trait]
impl<R> RuleRepository for Box<R>
where
    R: RuleRepository + ?Sized,
{
    type Error = R::Error;

    async fn list(&mut self) -> Result<Vec<CasbinRule>, Self::Error> {
        (**self).list().await
    }

    async fn count(&mut self) -> Result<usize, Self::Error> {
        (**self).count().await
    }

    async fn append(&mut self, rules: &[CasbinRule]) -> Result<usize, Self::Error> {
        (**self).append(rules).await
    }

    async fn remove(&mut self, rule: &CasbinRule) -> Result<usize, Self::Error> {
        (**self).remove(rule).await
    }

    async fn remove_filtered(
        &mut self,
        ptype: &str,
        filter: &FieldFilter,
    ) -> Result<usize, Self::Error> {
        (**self).remove_filtered(ptype, filter).await
    }

    async fn replace(&mut self, old: &CasbinRule, new: &CasbinRule) -> Result<bool, Self::Error> {
        (**self).replace(old, new).await
    }

    async fn replace_all(&mut self, rules: &[CasbinRule]) -> Result<(), Self::Error> {
        (**self).replace_all(rules).await
    }

    async fn clear(&mut self) -> Result<(), Self::Error> {
        (**self).clear().await
    }
}
