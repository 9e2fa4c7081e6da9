use std::env;
use std::path::PathBuf;

/// Local cache configuration.
///
/// Reads from the `ADPILOT_CACHE_URL` environment variable, falling back to
/// a SQLite file under the platform data directory when unset.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// SQLite connection URL (`sqlite://path/to/cache.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl CacheConfig {
    /// Environment variable consulted by [`CacheConfig::from_env`].
    pub const ENV_VAR: &str = "ADPILOT_CACHE_URL";

    /// URL of a private in-memory cache.
    pub const MEMORY_URL: &str = "sqlite::memory:";

    /// Build a config from the environment.
    ///
    /// Priority: `ADPILOT_CACHE_URL` env var, then [`CacheConfig::default_url`].
    pub fn from_env() -> Self {
        let database_url = env::var(Self::ENV_VAR).unwrap_or_else(|_| Self::default_url());
        Self { database_url }
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// `sqlite://<data dir>/adpilot/cache.db`.
    pub fn default_url() -> String {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adpilot");
        format!("sqlite://{}", dir.join("cache.db").display())
    }

    /// Whether this config points at an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Filesystem path of the cache file.
    ///
    /// Returns `None` for in-memory databases or URLs without a path.
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.is_memory() {
            return None;
        }
        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().filter(|s| !s.is_empty())?;
        Some(PathBuf::from(path))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_points_at_cache_file() {
        let url = CacheConfig::default_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("cache.db"));
    }

    #[test]
    fn database_path_extraction() {
        let cfg = CacheConfig::new("sqlite:///var/lib/adpilot/cache.db");
        assert_eq!(
            cfg.database_path(),
            Some(PathBuf::from("/var/lib/adpilot/cache.db"))
        );
    }

    #[test]
    fn database_path_strips_query() {
        let cfg = CacheConfig::new("sqlite:cache.db?mode=rwc");
        assert_eq!(cfg.database_path(), Some(PathBuf::from("cache.db")));
    }

    #[test]
    fn memory_has_no_path() {
        let cfg = CacheConfig::new(CacheConfig::MEMORY_URL);
        assert!(cfg.is_memory());
        assert_eq!(cfg.database_path(), None);
    }
}
