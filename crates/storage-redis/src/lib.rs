// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A Redis backend for the [`RuleRepository`] trait
//!
//! The whole policy lives in a single Redis list. Each element is the
//! canonical JSON encoding of a [`CasbinRule`]. Removals and replacements run
//! as Lua scripts which decode the elements and compare rules, so they are
//! atomic and don't depend on the exact JSON layout of the stored elements.
//!
//! ```no_run
//! # async fn example() -> Result<(), cra_storage_redis::RedisStorageError> {
//! use cra_storage::RuleRepository;
//! use cra_storage_redis::RedisRuleRepository;
//!
//! let client = redis::Client::open("redis://localhost:6379/0")?;
//! let mut repo = RedisRuleRepository::connect(client, "casbin_rules").await?;
//! let rules = repo.list().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`CasbinRule`]: cra_data_model::CasbinRule
//! [`RuleRepository`]: cra_storage::RuleRepository

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

mod repository;

pub use self::repository::RedisRuleRepository;

/// Generic error when interacting with the Redis list
#[derive(Debug, Error)]
pub enum RedisStorageError {
    /// An error which came from the Redis client
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

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
