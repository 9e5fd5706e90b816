//! CLI command implementations.

pub mod init;
pub mod partition;
pub mod run;

use crate::config::Config;
use anyhow::Result;
use std::path::Path;

/// Load an explicit config file, or search for `shoal.toml`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}
