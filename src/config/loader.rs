//! Loads and parses the TOML config file, following the teacher's
//! `tokio::fs::read_to_string` + `toml::from_str` idiom.

use std::path::Path;

use eyre::{Result, WrapErr as _};

use super::types::Config;

pub(crate) async fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read config file at: {}", path.display()))?;
    toml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse config as TOML at: {}", path.display()))
}
