// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

use cra_config::RedisConfig;
use cra_storage_redis::{RedisRuleRepository, RedisStorageError};
use thiserror::Error;

/// Error returned when the connection to Redis could not be established
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The configuration doesn't produce a valid connection URL
    #[error("invalid Redis connection URL")]
    InvalidUrl(#[from] url::ParseError),

    /// The client failed to connect
    #[error("failed to connect to Redis")]
    Redis(#[from] RedisStorageError),

    /// The server didn't answer in time
    #[error("timed out after {0:?} while connecting to Redis")]
    Timeout(Duration),
}

impl From<redis::RedisError> for ConnectError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.into())
    }
}

/// Open a [`RedisRuleRepository`] from the configuration
///
/// # Errors
///
/// Returns a [`ConnectError`] if the URL is invalid, or if the server can't
/// be reached within the configured timeout
#[tracing::instrument(
    name = "redis.connect_from_config",
    skip_all,
    fields(
        db.system = "redis",
        db.redis.key = %config.key,
        server.address,
    ),
    err,
)]
pub async fn repository_from_config(
    config: &RedisConfig,
) -> Result<RedisRuleRepository, ConnectError> {
    let url = config.connection_url()?;
    // Never log the URL itself, it may hold credentials
    if let Some(host) = url.host_str() {
        tracing::Span::current().record("server.address", host);
    }

    let client = redis::Client::open(url.as_str())?;
    let repo = tokio::time::timeout(
        config.connect_timeout,
        RedisRuleRepository::connect(client, config.key.clone()),
    )
    .await
    .map_err(|_elapsed| ConnectError::Timeout(config.connect_timeout))??;

    tracing::debug!("Connected to Redis");
    Ok(repo)
}
