// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Interactions with the storage backend
//!
//! This crate provides the [`RuleRepository`] trait, which is what the adapter
//! uses to read and mutate the list of policy rules. The list is ordered by
//! insertion, and allows duplicates: every operation is expressed in terms of
//! the list primitives a key-value store exposes (append, range, remove by
//! value, set by index).
//!
//! [`RuleRepository::boxed`] turns any repository into a
//! [`BoxRuleRepository`], to use it without caring about the underlying
//! storage backend, and without carrying around the generic type parameter.
//!
//! This crate also ships [`MemoryRuleRepository`], an in-process backend with
//! the same list semantics, which is useful for testing.
//!
//! # Implementing a new backend
//!
//! Backends implement [`RuleRepository`] with their own error type:
//!
//! ```ignore
//! #[async_trait]
//! impl RuleRepository for FakeRuleRepository {
//!     type Error = FakeError;
//!
//!     async fn list(&mut self) -> Result<Vec<CasbinRule>, Self::Error> {
//!         // ...
//!     }
//!
//!     // ...
//! }
//! ```
//!
//! Things to note:
//!
//!   1. All the functions are faillible, and use the associated error type
//!   2. Removals return how many elements were removed, since removing
//!      nothing is not an error
//!   3. Removals and replacements match elements by decoded value, and skip
//!      the elements which are not valid rules
//!   4. All the methods use an `&mut self`. This ensures only one
//!      operation is done at a time on a single repository instance.

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod memory;
pub(crate) mod repository;
pub mod rule;

/// Placeholder written over list elements before purging them by value
pub const TOMBSTONE: &str = "__CASBIN_DELETED__";

pub use self::{
    memory::{MemoryRuleRepository, MemoryStorageError},
    repository::{BoxRuleRepository, RepositoryError},
    rule::RuleRepository,
};
