//! On-disk snapshot persistence for in-memory caches
//!
//! This crate writes, locates, restores, renames and prunes snapshots
//! ("dumps") of an in-memory cache on behalf of a server runtime that owns
//! many independently named caches. The cache's key/value model stays
//! opaque: a dump is a byte blob plus the logical time it was taken at.
//!
//! # Architecture
//!
//! Four small pieces compose into the [`Dumper`]:
//!
//! - **Filename codec** ([`filename`]): a dump's update time and format
//!   version are encoded in its filename, which makes the directory listing
//!   the canonical index. No manifest files, no mtime.
//! - **Config cell** ([`ConfigCell`]): read-copy holder of the retention
//!   policy, so the policy can change live without blocking readers.
//! - **Atomic writer** ([`fs::write_atomically`]): write to a `.tmp`
//!   sibling, fsync, rename, fsync the parent directory. A crash leaves
//!   either the complete dump or a stray temporary that the next cleanup
//!   sweeps away, never a partial dump.
//! - **Directory scanner** ([`scan`]): classifies directory entries into
//!   finished dumps, stray temporaries and noise.
//!
//! All blocking filesystem work is dispatched through an injected
//! [`FsPool`] so that general-purpose tasks never stall on disk.
//!
//! # Retention
//!
//! [`Dumper::cleanup`] keeps at most `max_dump_count` dumps of the current
//! format version that are younger than `max_dump_age`. Older-version and
//! aged-out dumps are deleted; dumps with a *newer* format version are left
//! alone so a rolling downgrade loses no data.
//!
//! # Usage
//!
//! ```rust,no_run
//! use cache_dump::{CacheConfigStatic, DumpContents, Dumper, FsPool};
//!
//! # async fn demo() {
//! let config = CacheConfigStatic {
//!     dump_directory: "/var/cache/my-service/users".into(),
//!     dump_format_version: 3,
//!     max_dump_age: Some(std::time::Duration::from_secs(3600)),
//!     max_dump_count: 5,
//! };
//! let dumper = Dumper::new(config, FsPool::current(), "users");
//!
//! // Persist the serialized cache.
//! let written = dumper
//!     .write_new_dump(DumpContents {
//!         contents: b"serialized cache".to_vec(),
//!         update_time: chrono::Utc::now(),
//!     })
//!     .await;
//! assert!(written);
//!
//! // On startup, restore the freshest usable snapshot.
//! if let Some(dump) = dumper.read_latest_dump().await {
//!     println!("restored {} bytes", dump.contents.len());
//! }
//!
//! // Periodically reconcile the directory against the policy.
//! dumper.cleanup().await;
//! # }
//! ```

mod error;

pub mod config;
pub mod dumper;
pub mod filename;
pub mod fs;
pub mod scan;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use config::{CacheConfigStatic, ConfigCell};
pub use dumper::{DumpContents, Dumper};
pub use fs::FsPool;
