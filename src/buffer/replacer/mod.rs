//! Eviction policy implementations (replacers).
//!
//! - [`LruReplacer`] - Least recently used, skipping pinned slots

mod lru;

pub use lru::LruReplacer;
