// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use figment::{Figment, Profile, error::Error as FigmentError};
use serde::de::DeserializeOwned;

/// Error returned when a configuration section can't be loaded
pub type ConfigurationError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A part of the configuration, living under [`Self::PATH`] or at the root
pub trait ConfigurationSection: Sized + DeserializeOwned {
    /// Where the section lives, relative to the root. `None` for the root
    /// itself.
    const PATH: Option<&'static str> = None;

    /// Check the values which deserialized fine but can't work
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    fn validate(&self, _figment: &Figment) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Deserialize and validate the section
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing, can't be deserialized, or
    /// is invalid
    fn extract(figment: &Figment) -> Result<Self, ConfigurationError> {
        let this: Self = match Self::PATH {
            Some(path) => figment.extract_inner(path)?,
            None => figment.extract()?,
        };

        this.validate(figment)?;
        Ok(this)
    }

    /// Like [`Self::extract`], but a missing section gives the default
    /// settings
    ///
    /// # Errors
    ///
    /// Returns an error if the section can't be deserialized or is invalid
    fn extract_or_default(figment: &Figment) -> Result<Self, ConfigurationError>
    where
        Self: Default,
    {
        match Self::PATH {
            Some(path) if !figment.contains(path) => Ok(Self::default()),
            _ => Self::extract(figment),
        }
    }
}

/// Build an error pointing at `field` in the section at `path`, so that it
/// gets reported along with the file or variable which set it
pub(crate) fn field_error(
    figment: &Figment,
    path: &str,
    field: &str,
    message: impl Into<String>,
) -> FigmentError {
    let mut error = FigmentError::from(message.into());
    error.metadata = figment.find_metadata(path).cloned();
    error.profile = Some(Profile::Default);
    error.path = vec![path.to_owned(), field.to_owned()];
    error
}
