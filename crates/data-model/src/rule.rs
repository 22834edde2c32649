// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use thiserror::Error;

use crate::MAX_FIELDS;

/// Error returned when a rule has more positional fields than a record can
/// hold
#[derive(Debug, Error, PartialEq, Eq)]
#[error("a policy rule can have at most {MAX_FIELDS} fields, got {count}")]
pub struct RuleArityError {
    /// How many fields the rejected rule had
    pub count: usize,
}

/// Writes JSON the way Python's `json.dumps` does with its default settings:
/// `", "` and `": "` separators, and everything outside of printable ASCII
/// escaped as `\uXXXX`
struct PythonFormatter;

impl Formatter for PythonFormatter {
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (index, c) in fragment.char_indices() {
            if c == ' ' || c.is_ascii_graphic() {
                continue;
            }

            writer.write_all(&fragment.as_bytes()[start..index])?;
            let mut units = [0; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + c.len_utf8();
        }

        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// A single policy rule, as stored in the list
///
/// Unset fields are left out of the serialized form instead of being stored as
/// `null`, so the JSON representation of a rule only depends on its values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CasbinRule {
    pub ptype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v0: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v5: Option<String>,
}

impl CasbinRule {
    /// Build a rule from its type and its positional values
    ///
    /// # Errors
    ///
    /// Returns a [`RuleArityError`] if more than [`MAX_FIELDS`] values are
    /// given
    pub fn new<I, S>(ptype: impl Into<String>, values: I) -> Result<Self, RuleArityError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: [Option<String>; MAX_FIELDS] = Default::default();
        let mut count = 0;
        for value in values {
            if let Some(slot) = fields.get_mut(count) {
                *slot = Some(value.into());
            }
            count += 1;
        }

        if count > MAX_FIELDS {
            return Err(RuleArityError { count });
        }

        let [v0, v1, v2, v3, v4, v5] = fields;
        Ok(Self {
            ptype: ptype.into(),
            v0,
            v1,
            v2,
            v3,
            v4,
            v5,
        })
    }

    fn fields(&self) -> [Option<&str>; MAX_FIELDS] {
        [
            self.v0.as_deref(),
            self.v1.as_deref(),
            self.v2.as_deref(),
            self.v3.as_deref(),
            self.v4.as_deref(),
            self.v5.as_deref(),
        ]
    }

    /// Get the positional field at `index`, if it is set
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields().get(index).copied().flatten()
    }

    /// The set fields, in order
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.fields()
            .into_iter()
            .flatten()
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Consume the rule, returning the set fields in order
    #[must_use]
    pub fn into_values(self) -> Vec<String> {
        [self.v0, self.v1, self.v2, self.v3, self.v4, self.v5]
            .into_iter()
            .flatten()
            .collect()
    }

    /// The section this rule belongs to, i.e. the first character of its type
    ///
    /// `p2` belongs to the `p` section, `g2` to the `g` section.
    #[must_use]
    pub fn section(&self) -> &str {
        self.ptype
            .chars()
            .next()
            .map_or("", |c| &self.ptype[..c.len_utf8()])
    }

    /// Serialize the rule to its canonical JSON form
    ///
    /// The output is byte for byte what the Python adapter writes for the same
    /// rule, like `{"ptype": "p", "v0": "alice", "v1": "data1"}`, so that
    /// both can remove the elements the other one wrote.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut buffer = Vec::with_capacity(64);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, PythonFormatter);
        self.serialize(&mut serializer)?;

        // The formatter only ever writes ASCII
        Ok(buffer.into_iter().map(char::from).collect())
    }

    /// Deserialize a rule from its JSON form
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a JSON object with a `ptype`
    /// string and optional `v0`..`v5` strings
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Parse a rule from a policy line, like `p, alice, data1, read`
    ///
    /// Returns `None` for blank lines and `#` comments.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleArityError`] if the line has too many fields
    pub fn parse_line(line: &str) -> Result<Option<Self>, RuleArityError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut tokens = line.split(',').map(str::trim);
        let ptype = tokens.next().unwrap_or_default();
        Self::new(ptype, tokens).map(Some)
    }
}

impl fmt::Display for CasbinRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ptype)?;
        for value in self.fields().into_iter().flatten() {
            write!(f, ", {value}")?;
        }
        Ok(())
    }
}
