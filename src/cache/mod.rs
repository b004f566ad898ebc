//! Content-addressed image cache
//!
//! Cache keys are derived from the image name, platform, remote content
//! digest and manifest fingerprint. Entries are immutable once written: a
//! changed image or manifest set produces a different key rather than an
//! overwrite.
//!
//! # Lookup outcomes
//!
//! | Store reports | Blob on disk | Treated as |
//! |---------------|--------------|------------|
//! | miss | - | miss |
//! | hit | missing | miss |
//! | hit | present | hit |

pub mod key;
pub mod store;

pub use key::{sanitize, KeyBuilder};
pub use store::{format_bytes, CacheEntry, CacheStore, LocalCacheStore};
