// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./shopchat.toml` > `~/.config/shopchat/shopchat.toml` >
//! `/etc/shopchat/shopchat.toml`, with `SHOPCHAT_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ShopchatConfig;

/// Config sections addressable from the environment.
const SECTIONS: &[&str] = &[
    "server",
    "storage",
    "engine",
    "gateway",
    "realtime",
    "telegram",
    "whatsapp",
    "messenger",
];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/shopchat/shopchat.toml`
/// 3. `~/.config/shopchat/shopchat.toml`
/// 4. `./shopchat.toml`
/// 5. `SHOPCHAT_*` environment variables
pub fn load_config() -> Result<ShopchatConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ShopchatConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ShopchatConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ShopchatConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ShopchatConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ShopchatConfig::default()))
        .merge(Toml::file("/etc/shopchat/shopchat.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("shopchat/shopchat.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("shopchat.toml"))
        .merge(env_provider())
}

/// Map `SHOPCHAT_<SECTION>_<KEY>` onto `<section>.<key>`.
///
/// Uses `Env::map()` rather than `Env::split("_")` since keys themselves
/// contain underscores: `SHOPCHAT_WHATSAPP_PHONE_NUMBER_ID` must become
/// `whatsapp.phone_number_id`.
fn env_provider() -> Env {
    Env::prefixed("SHOPCHAT_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
