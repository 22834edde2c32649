// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with the list of policy rules saved in the storage
//! backend.

use async_trait::async_trait;
use cra_data_model::{CasbinRule, FieldFilter};

use crate::{BoxRuleRepository, repository::Erased};

/// A [`RuleRepository`] helps interacting with the list of [`CasbinRule`]
/// saved in the storage backend.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Get all the rules, in insertion order
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails, or if a
    /// stored element can't be decoded
    async fn list(&mut self) -> Result<Vec<CasbinRule>, Self::Error>;

    /// Count the elements in the list
    ///
    /// Tombstones left behind by an interrupted removal are counted until the
    /// next removal purges them.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn count(&mut self) -> Result<usize, Self::Error>;

    /// Append rules at the end of the list, in order
    ///
    /// Returns the length of the list after the operation. Appending nothing
    /// doesn't touch the backend.
    ///
    /// # Parameters
    ///
    /// * `rules`: The rules to append
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn append(&mut self, rules: &[CasbinRule]) -> Result<usize, Self::Error>;

    /// Remove every element holding the given rule
    ///
    /// Elements are compared as decoded rules, not as raw bytes. Elements
    /// which don't decode are left alone. Returns the number of elements
    /// removed.
    ///
    /// # Parameters
    ///
    /// * `rule`: The rule to remove
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove(&mut self, rule: &CasbinRule) -> Result<usize, Self::Error>;

    /// Remove every rule of type `ptype` matching the filter
    ///
    /// Returns the number of elements removed.
    ///
    /// # Parameters
    ///
    /// * `ptype`: The type of rules to consider
    /// * `filter`: The filter rules must match to be removed
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_filtered(
        &mut self,
        ptype: &str,
        filter: &FieldFilter,
    ) -> Result<usize, Self::Error>;

    /// Replace the first element holding `old` with `new`, atomically
    ///
    /// Returns `true` if an element was replaced.
    ///
    /// # Parameters
    ///
    /// * `old`: The rule to look for
    /// * `new`: The rule to put in its place
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn replace(&mut self, old: &CasbinRule, new: &CasbinRule) -> Result<bool, Self::Error>;

    /// Replace the whole list with the given rules
    ///
    /// # Parameters
    ///
    /// * `rules`: The new content of the list
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn replace_all(&mut self, rules: &[CasbinRule]) -> Result<(), Self::Error>;

    /// Delete the list
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn clear(&mut self) -> Result<(), Self::Error>;

    /// Transform the repository into a type-erased [`BoxRuleRepository`]
    fn boxed(self) -> BoxRuleRepository
    where
        Self: Sized + 'static,
        Self::Error: std::error::Error + Send + Sync + 'static,
    {
        Box::new(Erased(self))
    }
}
