//! Application configuration management.
//!
//! Configuration is layered with `figment`, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML config file (`--config`, else `<platform config dir>/config.toml`)
//! 3. `THUMBER_*` environment variables (e.g. `THUMBER_CACHE_DIR`)
//! 4. CLI flags, applied with [`Config::apply_cli`]
//!
//! The resulting [`Config`] is passed explicitly to
//! [`ThumbEngine::new`](crate::engine::ThumbEngine::new); nothing reads
//! global state after startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::source::remote::DEFAULT_MAX_BYTES;
use crate::spec::OutputFormat;

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "THUMBER_";

/// Engine and CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that relative image references are resolved against.
    pub image_dir: PathBuf,
    /// Root directory of the thumbnail cache.
    pub cache_dir: PathBuf,
    /// Timeout for downloading remote images, in seconds.
    pub remote_timeout_secs: u64,
    /// Largest remote image that will be downloaded, in bytes.
    pub remote_max_bytes: u64,
    /// Format used when a thumbnail request does not name one.
    pub default_format: OutputFormat,
    /// JPEG quality used when a request does not set `quality`.
    pub jpeg_quality: u8,
    /// Regenerate thumbnails whose local source changed after creation.
    pub check_freshness: bool,
    /// Scheme and host prepended to thumbnail URLs when `fullBase` is set.
    pub base_url: String,
    /// Path prefix under which thumbnails are served.
    pub route_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("."),
            cache_dir: default_cache_dir(),
            remote_timeout_secs: 30,
            remote_max_bytes: DEFAULT_MAX_BYTES,
            default_format: OutputFormat::Jpg,
            jpeg_quality: 90,
            check_freshness: true,
            base_url: "http://localhost".to_string(),
            route_prefix: "/thumb".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration from `path` (or the default platform path when
    /// `None`), then environment variables.
    ///
    /// A missing config file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment variable cannot be
    /// parsed, or the merged values fail [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = &path {
            log::debug!("Loading config file: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Config = figment
            .extract()
            .context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI flag overrides (highest priority layer).
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.image_dir {
            self.image_dir = dir.clone();
        }
        if let Some(dir) = &cli.cache_dir {
            self.cache_dir = dir.clone();
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.remote_timeout_secs == 0 {
            anyhow::bail!("remote_timeout_secs must be greater than 0");
        }
        if self.remote_max_bytes == 0 {
            anyhow::bail!("remote_max_bytes must be greater than 0");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            );
        }
        if !self.route_prefix.starts_with('/') {
            anyhow::bail!(
                "route_prefix must start with '/', got '{}'",
                self.route_prefix
            );
        }
        if self.cache_dir.as_os_str().is_empty() {
            anyhow::bail!("cache_dir must not be empty");
        }
        Ok(())
    }

    /// Remote fetch timeout as a [`Duration`].
    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "thumber", "thumber")
}

/// Default platform-specific configuration file path.
fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Default platform-specific cache root.
fn default_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("thumbs"))
        .unwrap_or_else(|| std::env::temp_dir().join("thumber").join("thumbs"))
}
