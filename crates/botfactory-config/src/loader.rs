// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/botfactory/botfactory.toml`, then
//! `$XDG_CONFIG_HOME/botfactory/botfactory.toml`, then `./botfactory.toml`,
//! with `BOTFACTORY_*` environment variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BotFactoryConfig;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "BOTFACTORY_";

/// Top-level sections, used to turn `ai_api_key` into `ai.api_key`.
const SECTIONS: &[&str] = &[
    "service",
    "ai",
    "context",
    "worker",
    "replies",
    "supervisor",
    "subscription",
    "analytics",
    "storage",
    "gateway",
    "prometheus",
];

const TIERS: &[&str] = &["free", "starter", "basic", "premium"];

/// System-wide configuration file.
pub fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/botfactory/botfactory.toml")
}

/// Per-user configuration file, if a config directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("botfactory/botfactory.toml"))
}

/// Configuration file in the working directory.
pub fn local_config_path() -> PathBuf {
    PathBuf::from("botfactory.toml")
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. System file
/// 3. User file
/// 4. Local file
/// 5. `BOTFACTORY_*` environment variables
pub fn load_config() -> Result<BotFactoryConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<BotFactoryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BotFactoryConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BotFactoryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BotFactoryConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the standard lookup, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(BotFactoryConfig::default()))
        .merge(Toml::file(system_config_path()));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment
        .merge(Toml::file(local_config_path()))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// `Env::split("_")` would break keys that contain underscores
/// (`BOTFACTORY_AI_API_KEY` must become `ai.api_key`, not `ai.api.key`), so
/// only the section prefix is split off.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        else {
            continue;
        };
        if *section == "subscription" {
            for tier in TIERS {
                if let Some(field) = rest.strip_prefix(tier).and_then(|r| r.strip_prefix('_')) {
                    return format!("subscription.{tier}.{field}");
                }
            }
        }
        return format!("{section}.{rest}");
    }
    key.to_string()
}
