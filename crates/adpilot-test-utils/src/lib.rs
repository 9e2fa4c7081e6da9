//! Shared test utilities for adpilot integration tests.
//!
//! - [`StubPlatform`]: an in-memory advertising platform with scripted
//!   responses, a call log, failure injection and gates that hold a call
//!   in flight until the test releases it.
//! - [`create_test_cache`] / [`create_file_cache`]: migrated SQLite caches.
//! - [`fixtures`]: campaigns and accounts in common lifecycle positions.

pub mod fixtures;
mod stub;

use std::path::Path;

use sqlx::SqlitePool;

use adpilot_db::config::CacheConfig;
use adpilot_db::pool;

pub use stub::{Gate, RecordedCall, StubCall, StubPlatform};

/// Create a private in-memory cache with migrations applied.
pub async fn create_test_cache() -> SqlitePool {
    pool::open_cache(&CacheConfig::new(CacheConfig::MEMORY_URL))
        .await
        .expect("failed to open in-memory cache")
}

/// Create a file-backed cache at `dir/cache.db` with migrations applied.
pub async fn create_file_cache(dir: &Path) -> SqlitePool {
    let url = format!("sqlite://{}", dir.join("cache.db").display());
    pool::open_cache(&CacheConfig::new(url))
        .await
        .expect("failed to open file cache")
}
