// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use thiserror::Error;

use crate::{CasbinRule, MAX_FIELDS};

/// Error returned when a field filter does not fit in a rule
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid field filter: {len} value(s) starting at field {field_index}")]
pub struct InvalidFilterError {
    pub field_index: usize,
    pub len: usize,
}

/// Selects rules by a run of consecutive field values, starting at
/// `field_index`
///
/// An empty value matches any field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    field_index: usize,
    field_values: Vec<String>,
}

impl FieldFilter {
    /// Create a new filter
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidFilterError`] if `field_index` is past the last
    /// field, or if the values don't fit between `field_index` and the last
    /// field, or if there is nothing to filter on at all.
    pub fn new(field_index: usize, field_values: Vec<String>) -> Result<Self, InvalidFilterError> {
        let end = field_index + field_values.len();
        if field_index >= MAX_FIELDS || end == 0 || end > MAX_FIELDS {
            return Err(InvalidFilterError {
                field_index,
                len: field_values.len(),
            });
        }

        Ok(Self {
            field_index,
            field_values,
        })
    }

    #[must_use]
    pub fn field_index(&self) -> usize {
        self.field_index
    }

    #[must_use]
    pub fn field_values(&self) -> &[String] {
        &self.field_values
    }

    /// Check whether the rule matches this filter
    ///
    /// A rule which doesn't have a field the filter constrains doesn't match.
    #[must_use]
    pub fn matches(&self, rule: &CasbinRule) -> bool {
        self.field_values
            .iter()
            .enumerate()
            .filter(|(_, expected)| !expected.is_empty())
            .all(|(offset, expected)| {
                rule.field(self.field_index + offset) == Some(expected.as_str())
            })
    }
}

/// Filter applied when loading a subset of the policy
///
/// Each list is matched positionally against the rules of its section, an
/// empty value matching anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFilter {
    pub p: Vec<String>,
    pub g: Vec<String>,
}

impl PolicyFilter {
    /// Check whether the rule should be loaded
    #[must_use]
    pub fn matches(&self, rule: &CasbinRule) -> bool {
        let values = match rule.section() {
            "p" => &self.p,
            "g" => &self.g,
            _ => return true,
        };

        values
            .iter()
            .enumerate()
            .filter(|(_, expected)| !expected.is_empty())
            .all(|(index, expected)| rule.field(index) == Some(expected.as_str()))
    }
}
