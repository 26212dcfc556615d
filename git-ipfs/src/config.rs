//! Helper configuration, read from the environment git sets up for us.
use std::path::PathBuf;

use thiserror::Error;

/// Environment variables used by the helper.
pub mod env {
    pub use std::env::*;

    /// Local repository git is fetching into. Always set by git when
    /// invoking a remote helper.
    pub const GIT_DIR: &str = "GIT_DIR";
    /// Address (`host:port`) of the IPFS HTTP API.
    pub const IPFS_API: &str = "IPFS_API";
}

/// Address of a local IPFS daemon's HTTP API.
pub const DEFAULT_API: &str = "127.0.0.1:5001";

#[derive(Debug, Error)]
pub enum Error {
    #[error("environment variable `{0}` is not set")]
    Missing(&'static str),
    #[error("environment variable `{0}` is empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Local repository to write fetched objects into.
    pub git_dir: PathBuf,
    /// IPFS HTTP API address.
    pub api: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|key| env::var_os(key).map(|v| v.to_string_lossy().into_owned()))
    }

    /// Load configuration using the given variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let git_dir = var(env::GIT_DIR).ok_or(Error::Missing(env::GIT_DIR))?;
        if git_dir.is_empty() {
            return Err(Error::Empty(env::GIT_DIR));
        }
        let api = var(env::IPFS_API)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_API.to_owned());

        Ok(Self {
            git_dir: PathBuf::from(git_dir),
            api,
        })
    }
}
