//! A concurrent map that serializes every access through a single owner.
//!
//! Rather than guarding a `HashMap` with a lock, the map is owned outright by one long-lived task
//! (the *owner*). Callers never touch the storage. Each operation is a request record sent over
//! one of four channels (add, get, delete, size), carrying a one-shot reply channel that the owner
//! answers exactly once. The owner handles one request at a time, to completion, so no caller can
//! ever observe a half-applied mutation.
//!
//! Two renditions are provided:
//!
//! - [`SharedMap`], where the owner is a Tokio task and every operation is `async`.
//! - [`blocking::SharedMap`], where the owner is a dedicated thread and every operation blocks the
//!   calling thread.
//!
//! ```no_run
//! # async fn demo() -> Result<(), sharedmap::MapError> {
//! let map = sharedmap::SharedMap::new();
//! assert!(!map.add(1, "one").await?);
//! assert_eq!(map.get(1).await?, Some("one"));
//! assert_eq!(map.size().await?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! The order in which requests from *different* callers reach the owner is unspecified. A caller
//! only has a guarantee about an earlier operation once it has received that operation's reply.

pub mod blocking;
mod error;
mod shared_map;
mod storage;
mod tracing_shim;

pub use self::error::MapError;
pub use self::shared_map::{Builder, SharedMap};
