// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::LazyLock;

use async_trait::async_trait;
use cra_data_model::{CasbinRule, FieldFilter};
use cra_storage::{RuleRepository, TOMBSTONE};
use redis::{
    AsyncCommands, Script,
    aio::{ConnectionLike, ConnectionManager},
};

use crate::RedisStorageError;

/// Helpers shared by the scripts below
///
/// `decode` returns `nil` for anything which isn't a rule, tombstones
/// included, so those elements never match.
const PRELUDE: &str = r"
local fields = {'v0', 'v1', 'v2', 'v3', 'v4', 'v5'}

local function decode(entry)
    local ok, rule = pcall(cjson.decode, entry)
    if not ok or type(rule) ~= 'table' or type(rule.ptype) ~= 'string' then
        return nil
    end
    for _, name in ipairs(fields) do
        if rule[name] == cjson.null then
            rule[name] = nil
        end
    end
    return rule
end

local function same(a, b)
    if a.ptype ~= b.ptype then
        return false
    end
    for _, name in ipairs(fields) do
        if a[name] ~= b[name] then
            return false
        end
    end
    return true
end

-- Mark the matching elements, then purge all the marks in one go, so that
-- the indices stay valid while marking. Leftover marks go away too.
local function remove_matching(key, tombstone, matches)
    local entries = redis.call('LRANGE', key, 0, -1)
    local removed = 0
    for i, entry in ipairs(entries) do
        local rule = decode(entry)
        if rule and matches(rule) then
            redis.call('LSET', key, i - 1, tombstone)
            removed = removed + 1
        end
    end
    redis.call('LREM', key, 0, tombstone)
    return removed
end
";

/// Removes every element holding the rule `ARGV[2]`, using `ARGV[1]` as the
/// tombstone.
///
/// Returns the number of elements removed.
static REMOVE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r"{PRELUDE}
        local target = decode(ARGV[2])
        return remove_matching(KEYS[1], ARGV[1], function(rule)
            return same(rule, target)
        end)
        "
    ))
});

/// Removes every rule of type `ARGV[2]` whose fields starting at index
/// `ARGV[3]` match `ARGV[4..]`, an empty value matching anything. `ARGV[1]` is
/// the tombstone.
///
/// Returns the number of elements removed.
static REMOVE_FILTERED_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r"{PRELUDE}
        local ptype = ARGV[2]
        local field_index = tonumber(ARGV[3])
        return remove_matching(KEYS[1], ARGV[1], function(rule)
            if rule.ptype ~= ptype then
                return false
            end
            for i = 4, #ARGV do
                local value = ARGV[i]
                if value ~= '' and rule[fields[field_index + i - 3]] ~= value then
                    return false
                end
            end
            return true
        end)
        "
    ))
});

/// Replaces the first element holding the rule `ARGV[1]` with `ARGV[2]`.
///
/// Returns 1 if an element was replaced, 0 otherwise.
static REPLACE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(&format!(
        r"{PRELUDE}
        local target = decode(ARGV[1])
        local entries = redis.call('LRANGE', KEYS[1], 0, -1)
        for i, entry in ipairs(entries) do
            local rule = decode(entry)
            if rule and same(rule, target) then
                redis.call('LSET', KEYS[1], i - 1, ARGV[2])
                return 1
            end
        end
        return 0
        "
    ))
});

fn encode(rule: &CasbinRule) -> Result<String, RedisStorageError> {
    rule.encode().map_err(RedisStorageError::Encode)
}

fn decode(index: usize, entry: &str) -> Result<CasbinRule, RedisStorageError> {
    CasbinRule::decode(entry).map_err(|source| RedisStorageError::Decode { index, source })
}

/// An implementation of [`RuleRepository`] storing the rules in a Redis list
pub struct RedisRuleRepository<C = ConnectionManager> {
    conn: C,
    key: String,
}

impl RedisRuleRepository {
    /// Open a managed connection from a Redis client
    ///
    /// The connection transparently reconnects when the server goes away.
    ///
    /// # Errors
    ///
    /// Returns a [`RedisStorageError`] if the initial connection fails
    #[tracing::instrument(name = "redis.connect", skip_all, err)]
    pub async fn connect(
        client: redis::Client,
        key: impl Into<String>,
    ) -> Result<Self, RedisStorageError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, key))
    }
}

impl<C> RedisRuleRepository<C> {
    /// Create a new [`RedisRuleRepository`] from an existing connection,
    /// storing the rules under `key`
    pub fn new(conn: C, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    /// The key of the list holding the rules
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Consume this [`RedisRuleRepository`], returning the underlying
    /// connection.
    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C> RedisRuleRepository<C>
where
    C: ConnectionLike + Send + Sync,
{
    /// Check that the server answers
    ///
    /// # Errors
    ///
    /// Returns a [`RedisStorageError`] if the server could not be reached
    #[tracing::instrument(name = "redis.ping", skip_all, err)]
    pub async fn ping(&mut self) -> Result<(), RedisStorageError> {
        let _pong: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    /// Get the raw list elements, without decoding them
    ///
    /// # Errors
    ///
    /// Returns a [`RedisStorageError`] if the list could not be read
    #[tracing::instrument(
        name = "redis.rules.entries",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key),
        err,
    )]
    pub async fn entries(&mut self) -> Result<Vec<String>, RedisStorageError> {
        let entries: Vec<String> = self.conn.lrange(&self.key, 0, -1).await?;
        Ok(entries)
    }
}

#[async_trait]
impl<C> RuleRepository for RedisRuleRepository<C>
where
    C: ConnectionLike + Send + Sync,
{
    type Error = RedisStorageError;

    #[tracing::instrument(
        name = "redis.rules.list",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key),
        err,
    )]
    async fn list(&mut self) -> Result<Vec<CasbinRule>, Self::Error> {
        let entries: Vec<String> = self.conn.lrange(&self.key, 0, -1).await?;

        entries
            .iter()
            .enumerate()
            // Leftovers of a removal another client didn't complete
            .filter(|(_, entry)| *entry != TOMBSTONE)
            .map(|(index, entry)| decode(index, entry))
            .collect()
    }

    #[tracing::instrument(
        name = "redis.rules.count",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key),
        err,
    )]
    async fn count(&mut self) -> Result<usize, Self::Error> {
        let count: usize = self.conn.llen(&self.key).await?;
        Ok(count)
    }

    #[tracing::instrument(
        name = "redis.rules.append",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key, rules.count = rules.len()),
        err,
    )]
    async fn append(&mut self, rules: &[CasbinRule]) -> Result<usize, Self::Error> {
        if rules.is_empty() {
            return self.count().await;
        }

        let encoded = rules.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        let len: usize = self.conn.rpush(&self.key, encoded).await?;
        Ok(len)
    }

    #[tracing::instrument(
        name = "redis.rules.remove",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key, rules.removed),
        err,
    )]
    async fn remove(&mut self, rule: &CasbinRule) -> Result<usize, Self::Error> {
        let target = encode(rule)?;

        let removed: usize = REMOVE_SCRIPT
            .key(&self.key)
            .arg(TOMBSTONE)
            .arg(target)
            .invoke_async(&mut self.conn)
            .await?;

        tracing::Span::current().record("rules.removed", removed);
        Ok(removed)
    }

    #[tracing::instrument(
        name = "redis.rules.remove_filtered",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key, rules.ptype = ptype, rules.removed),
        err,
    )]
    async fn remove_filtered(
        &mut self,
        ptype: &str,
        filter: &FieldFilter,
    ) -> Result<usize, Self::Error> {
        let removed: usize = REMOVE_FILTERED_SCRIPT
            .key(&self.key)
            .arg(TOMBSTONE)
            .arg(ptype)
            .arg(filter.field_index())
            .arg(filter.field_values())
            .invoke_async(&mut self.conn)
            .await?;

        tracing::Span::current().record("rules.removed", removed);
        Ok(removed)
    }

    #[tracing::instrument(
        name = "redis.rules.replace",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key),
        err,
    )]
    async fn replace(&mut self, old: &CasbinRule, new: &CasbinRule) -> Result<bool, Self::Error> {
        let old = encode(old)?;
        let new = encode(new)?;

        let replaced: i64 = REPLACE_SCRIPT
            .key(&self.key)
            .arg(old)
            .arg(new)
            .invoke_async(&mut self.conn)
            .await?;

        Ok(replaced == 1)
    }

    #[tracing::instrument(
        name = "redis.rules.replace_all",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key, rules.count = rules.len()),
        err,
    )]
    async fn replace_all(&mut self, rules: &[CasbinRule]) -> Result<(), Self::Error> {
        let encoded = rules.iter().map(encode).collect::<Result<Vec<_>, _>>()?;

        let mut pipe = redis::pipe();
        pipe.atomic().del(&self.key).ignore();
        if !encoded.is_empty() {
            pipe.rpush(&self.key, encoded).ignore();
        }

        let (): () = pipe.query_async(&mut self.conn).await?;
        Ok(())
    }

    #[tracing::instrument(
        name = "redis.rules.clear",
        skip_all,
        fields(db.system = "redis", db.redis.key = %self.key),
        err,
    )]
    async fn clear(&mut self) -> Result<(), Self::Error> {
        let _deleted: usize = self.conn.del(&self.key).await?;
        Ok(())
    }
}
