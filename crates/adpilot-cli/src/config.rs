//! Configuration file management for adpilot.
//!
//! Provides a TOML-based config file at `~/.config/adpilot/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adpilot_core::platform::HttpPlatformConfig;
use adpilot_db::config::CacheConfig;

/// API root used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/v1";

pub const API_URL_ENV: &str = "ADPILOT_API_URL";
pub const ACCESS_TOKEN_ENV: &str = "ADPILOT_ACCESS_TOKEN";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub platform: PlatformSection,
    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSection {
    pub api_url: String,
    /// Bearer token for the platform API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    pub url: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            url: CacheConfig::default_url(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the adpilot config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/adpilot` or `~/.config/adpilot`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("adpilot");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("adpilot")
}

/// Return the path to the adpilot config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file at `path` if it exists. A file that exists but
/// cannot be parsed is an error.
pub fn load_optional_config(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(path).map(Some)
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may hold an access token.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct CliOverrides<'a> {
    pub api_url: Option<&'a str>,
    pub access_token: Option<&'a str>,
    pub cache_url: Option<&'a str>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct AdpilotConfig {
    pub platform: HttpPlatformConfig,
    pub cache: CacheConfig,
}

impl AdpilotConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - API URL: `--api-url` > `ADPILOT_API_URL` > `platform.api_url` > [`DEFAULT_API_URL`]
    /// - Access token: `--access-token` > `ADPILOT_ACCESS_TOKEN` > `platform.access_token` > none
    /// - Cache URL: `--cache-url` > `ADPILOT_CACHE_URL` > `cache.url` > [`CacheConfig::default_url`]
    pub fn resolve(cli: CliOverrides<'_>) -> Result<Self> {
        let file = load_optional_config(&config_path())?;
        Ok(Self::resolve_with(cli, |key| std::env::var(key).ok(), file.as_ref()))
    }

    /// [`AdpilotConfig::resolve`] with an explicit environment and file.
    /// Empty environment values count as unset.
    pub fn resolve_with(
        cli: CliOverrides<'_>,
        env: impl Fn(&str) -> Option<String>,
        file: Option<&ConfigFile>,
    ) -> Self {
        let env = |key: &str| env(key).filter(|value| !value.is_empty());

        let api_url = cli
            .api_url
            .map(str::to_string)
            .or_else(|| env(API_URL_ENV))
            .or_else(|| file.map(|f| f.platform.api_url.clone()))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let access_token = cli
            .access_token
            .map(str::to_string)
            .or_else(|| env(ACCESS_TOKEN_ENV))
            .or_else(|| file.and_then(|f| f.platform.access_token.clone()));

        let cache_url = cli
            .cache_url
            .map(str::to_string)
            .or_else(|| env(CacheConfig::ENV_VAR))
            .or_else(|| file.map(|f| f.cache.url.clone()))
            .unwrap_or_else(CacheConfig::default_url);

        let mut platform = HttpPlatformConfig::new(api_url);
        if let Some(token) = access_token {
            platform = platform.with_access_token(token);
        }

        Self {
            platform,
            cache: CacheConfig::new(cache_url),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
