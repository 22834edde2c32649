// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};

mod config;
mod doctor;
mod rules;

#[derive(Parser, Debug)]
enum Subcommand {
    /// Configuration-related commands
    Config(self::config::Options),

    /// Manage the stored policy rules
    Rules(self::rules::Options),

    /// Run diagnostics on the Redis server and the stored rules
    Doctor(self::doctor::Options),
}

#[derive(Parser, Debug)]
#[command(version)]
pub struct Options {
    /// Path to the configuration file
    ///
    /// Can be repeated, later files override earlier ones. Defaults to the
    /// colon-separated list in `CRA_CONFIG`, or `config.yaml`.
    #[arg(short, long, global = true, action = clap::ArgAction::Append)]
    config: Vec<Utf8PathBuf>,

    #[command(subcommand)]
    subcommand: Subcommand,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        use Subcommand as S;
        match self.subcommand {
            S::Config(c) => c.run(figment).await,
            S::Rules(c) => c.run(figment).await,
            S::Doctor(c) => c.run(figment).await,
        }
    }

    /// Get a [`Figment`] instance with the configuration loaded
    pub fn figment(&self) -> Figment {
        let configs = if self.config.is_empty() {
            // Read the CRA_CONFIG environment variable
            std::env::var("CRA_CONFIG")
                // Default to "config.yaml"
                .unwrap_or_else(|_| "config.yaml".to_owned())
                // Split the file list on `:`
                .split(':')
                .map(Utf8PathBuf::from)
                .collect()
        } else {
            self.config.clone()
        };

        let base = configs
            .into_iter()
            .fold(Figment::new(), |f, path| f.admerge(Yaml::file(path)));

        // Environment variables win over the files, `CRA_REDIS__HOST` sets
        // `redis.host`
        base.merge(Env::prefixed("CRA_").ignore(&["CONFIG"]).split("__"))
    }
}
