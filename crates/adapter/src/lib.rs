// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A [`casbin::Adapter`] persisting the policy in a Redis list
//!
//! [`RuleAdapter`] translates the calls the enforcer makes into operations on
//! a [`RuleRepository`]. By default, it uses the Redis backend, but any
//! repository works, which is how the tests run against the in-memory one.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use casbin::{CoreApi, DefaultModel, Enforcer};
//! use cra_adapter::RuleAdapter;
//! use cra_config::RedisConfig;
//!
//! let adapter = RuleAdapter::connect(&RedisConfig::default()).await?;
//! let model = DefaultModel::from_file("rbac_model.conf").await?;
//! let enforcer = Enforcer::new(model, adapter).await?;
//!
//! if enforcer.enforce(("alice", "data1", "read"))? {
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`RuleRepository`]: cra_storage::RuleRepository

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod adapter;
mod connect;

pub use self::{
    adapter::RuleAdapter,
    connect::{ConnectError, repository_from_config},
};
