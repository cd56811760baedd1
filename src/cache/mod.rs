//! Response cache for read-style service calls
//!
//! This module provides a cache store that keeps successful responses for a
//! bounded time (five minutes by default), in memory and as JSON files in an
//! XDG cache directory so fresh entries survive a restart. Stale entries are
//! treated as absent and evicted on lookup; nothing stale is ever served.

mod manager;

pub use manager::{default_cache_dir, CacheError, CacheStore, CachedData, DEFAULT_TTL_SECS};
