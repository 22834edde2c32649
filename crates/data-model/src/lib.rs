// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![allow(clippy::module_name_repetitions)]

pub(crate) mod filter;
pub(crate) mod rule;

/// The list key used when none is configured
pub const DEFAULT_KEY: &str = "casbin_rules";

/// The maximum number of positional fields a rule can carry
pub const MAX_FIELDS: usize = 6;

pub use self::{
    filter::{FieldFilter, InvalidFilterError, PolicyFilter},
    rule::{CasbinRule, RuleArityError},
};
