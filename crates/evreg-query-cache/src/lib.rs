//! Keyed query cache for the event registration client
//!
//! Entries are addressed by a [`QueryKey`], an ordered list of string
//! segments such as `["events", "list", "page=1&limit=10"]`. Each entry holds
//! the last known JSON payload together with the instant it was fetched and
//! the freshness window it was fetched with.
//!
//! # Operations
//!
//! ```text
//! fetch(key, window, loader)  fresh hit -> cached value, otherwise load once
//! invalidate(prefix)          mark every entry under `prefix` as stale
//! write(key, value)           unconditional overwrite (mutation layer only)
//! remove(key)                 drop an entry outright
//! snapshot(key) / restore()   save and put back a prior value (rollback)
//! ```
//!
//! Concurrent `fetch` calls for the same key while a load is in flight share
//! that load instead of issuing their own.
//!
//! # Example
//!
//! ```rust,no_run
//! use evreg_query_cache::{QueryCache, QueryKey};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let cache: QueryCache<String> = QueryCache::new();
//! let key = QueryKey::new(["events", "detail", "42"]);
//!
//! let value = cache
//!     .fetch(&key, Duration::from_secs(300), || async {
//!         Ok(serde_json::json!({ "id": "42" }))
//!     })
//!     .await?;
//! assert_eq!(value["id"], "42");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod key;

pub use cache::{CacheSnapshot, CacheStats, QueryCache, DEFAULT_STALE_TIME};
pub use key::QueryKey;
