// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! An in-process implementation of the [`RuleRepository`]
//!
//! Elements are kept encoded, exactly like a remote list would store them.
//! Removals and replacements decode the elements and compare rules, so that
//! elements written with another JSON layout still match.

use std::sync::Arc;

use async_trait::async_trait;
use cra_data_model::{CasbinRule, FieldFilter};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{RuleRepository, TOMBSTONE};

/// Errors returned by the [`MemoryRuleRepository`]
#[derive(Debug, Error)]
pub enum MemoryStorageError {
    /// A rule could not be encoded
    #[error("failed to encode a policy rule")]
    Encode(#[source] serde_json::Error),

    /// A list element could not be decoded
    #[error("failed to decode the list element at index {index}")]
    Decode {
        /// Position of the element in the list
        index: usize,

        /// The underlying decoding error
        #[source]
        source: serde_json::Error,
    },
}

/// A [`RuleRepository`] keeping the list in memory
///
/// Clones share the same list, the same way two connections to a remote
/// backend see the same key.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuleRepository {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryRuleRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of the raw list elements
    pub async fn entries(&self) -> Vec<String> {
        self.entries.lock().await.clone()
    }

    /// Append a raw element, bypassing the encoding
    pub async fn push_raw(&self, entry: impl Into<String>) {
        self.entries.lock().await.push(entry.into());
    }
}

fn encode(rule: &CasbinRule) -> Result<String, MemoryStorageError> {
    rule.encode().map_err(MemoryStorageError::Encode)
}

fn decode(index: usize, entry: &str) -> Result<CasbinRule, MemoryStorageError> {
    CasbinRule::decode(entry).map_err(|source| MemoryStorageError::Decode { index, source })
}

/// Drop the elements holding a rule matching the predicate, along with all
/// the tombstones. Returns how many rules were dropped.
fn remove_matching(entries: &mut Vec<String>, predicate: impl Fn(&CasbinRule) -> bool) -> usize {
    let mut removed = 0;
    entries.retain(|entry| {
        if entry == TOMBSTONE {
            return false;
        }

        let matched = CasbinRule::decode(entry).is_ok_and(|rule| predicate(&rule));
        removed += usize::from(matched);
        !matched
    });
    removed
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    type Error = MemoryStorageError;

    async fn list(&mut self) -> Result<Vec<CasbinRule>, Self::Error> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| *entry != TOMBSTONE)
            .map(|(index, entry)| decode(index, entry))
            .collect()
    }

    async fn count(&mut self) -> Result<usize, Self::Error> {
        Ok(self.entries.lock().await.len())
    }

    async fn append(&mut self, rules: &[CasbinRule]) -> Result<usize, Self::Error> {
        let encoded = rules.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        let mut entries = self.entries.lock().await;
        entries.extend(encoded);
        Ok(entries.len())
    }

    async fn remove(&mut self, rule: &CasbinRule) -> Result<usize, Self::Error> {
        let mut entries = self.entries.lock().await;
        Ok(remove_matching(&mut entries, |candidate| candidate == rule))
    }

    async fn remove_filtered(
        &mut self,
        ptype: &str,
        filter: &FieldFilter,
    ) -> Result<usize, Self::Error> {
        let mut entries = self.entries.lock().await;
        Ok(remove_matching(&mut entries, |rule| {
            rule.ptype == ptype && filter.matches(rule)
        }))
    }

    async fn replace(&mut self, old: &CasbinRule, new: &CasbinRule) -> Result<bool, Self::Error> {
        let new = encode(new)?;
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries
            .iter_mut()
            .find(|entry| CasbinRule::decode(entry).is_ok_and(|rule| rule == *old))
        else {
            return Ok(false);
        };

        *entry = new;
        Ok(true)
    }

    async fn replace_all(&mut self, rules: &[CasbinRule]) -> Result<(), Self::Error> {
        let encoded = rules.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        *self.entries.lock().await = encoded;
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), Self::Error> {
        self.entries.lock().await.clear();
        Ok(())
    }
}
