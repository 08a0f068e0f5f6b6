//! Dump orchestration: write, locate, restore, rename, prune.
//!
//! A [`Dumper`] owns the dump directory of a single named cache. It composes
//! the filename codec, the config cell, the atomic writer and the directory
//! scanner into five operations:
//!
//! - [`write_new_dump`](Dumper::write_new_dump) produces a new snapshot
//!   without ever exposing a partial file;
//! - [`read_latest_dump`](Dumper::read_latest_dump) restores the freshest
//!   snapshot that satisfies the version and age policy;
//! - [`bump_dump_time`](Dumper::bump_dump_time) records a later known-fresh
//!   time by renaming instead of rewriting;
//! - [`cleanup`](Dumper::cleanup) reconciles the directory against the
//!   retention policy and sweeps stray temporaries;
//! - [`set_config`](Dumper::set_config) publishes a new policy without
//!   blocking readers.
//!
//! Mutating operations must not run concurrently on one instance (single
//! writer per cache name); `read_latest_dump` and `set_config` are safe from
//! any task at any time. All operations report their outcome as a `bool` or
//! `Option` and log failures instead of propagating errors.

use crate::Error;
use crate::config::{CacheConfigStatic, ConfigCell};
use crate::filename::{self, ParsedDumpName};
use crate::fs::{self, FsPool};
use crate::scan;
use chrono::{DateTime, TimeDelta, Utc};
use std::path::PathBuf;
use std::sync::Arc;

/// Mode bits of a finished dump file (owner read+write).
const DUMP_FILE_MODE: u32 = 0o600;

/// Opaque cache snapshot handed to and from the dumper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpContents {
    /// Serialized cache contents; never interpreted by the dumper
    pub contents: Vec<u8>,
    /// Logical time of the snapshot
    pub update_time: DateTime<Utc>,
}

/// Writes, locates, renames and prunes the on-disk dumps of one cache.
#[derive(Debug)]
pub struct Dumper {
    cache_name: String,
    fs_pool: FsPool,
    config: ConfigCell,
}

impl Dumper {
    /// Create a dumper for the cache identified by `cache_name`.
    ///
    /// The name is used in log messages only; isolation between caches is by
    /// `dump_directory`.
    #[must_use]
    pub fn new(config: CacheConfigStatic, fs_pool: FsPool, cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            fs_pool,
            config: ConfigCell::new(config),
        }
    }

    /// Write a new dump, returning whether it is now durably on disk.
    ///
    /// Refuses to overwrite: if a dump for the same rounded update time and
    /// the configured format version already exists, nothing is written and
    /// `false` is returned. Any other failure is logged and also yields
    /// `false`; no partial state is ever observable.
    pub async fn write_new_dump(&self, dump: DumpContents) -> bool {
        let config = self.config.read();
        let dump_size = dump.contents.len();
        let path = dump_path_for(dump.update_time, &config);

        let result = {
            let path = path.clone();
            self.fs_pool
                .run(move || {
                    if path.exists() {
                        return Err(Error::already_exists(&path));
                    }
                    fs::write_atomically(&path, &dump.contents, DUMP_FILE_MODE)
                })
                .await
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    cache_name = %self.cache_name,
                    path = %path.display(),
                    bytes = dump_size,
                    "successfully dumped cache"
                );
                true
            }
            Err(err) => {
                tracing::error!(
                    cache_name = %self.cache_name,
                    path = %path.display(),
                    %err,
                    "could not dump cache"
                );
                false
            }
        }
    }

    /// Locate and read the freshest usable dump.
    ///
    /// Usable means: format version equal to the configured one, and update
    /// time within `max_dump_age` of now (when an age limit is set). Returns
    /// `None` when no dump qualifies or on any I/O failure.
    pub async fn read_latest_dump(&self) -> Option<DumpContents> {
        let config = self.config.read();

        let best = {
            let config = Arc::clone(&config);
            self.fs_pool.run(move || Ok(select_latest(&config))).await
        };

        let best = match best {
            Ok(best) => best,
            Err(err) => {
                tracing::error!(
                    cache_name = %self.cache_name,
                    %err,
                    "error while looking for cache dumps"
                );
                return None;
            }
        };

        let Some(dump) = best else {
            tracing::info!(cache_name = %self.cache_name, "no usable cache dumps found");
            return None;
        };

        let path = filename::dump_path(&config.dump_directory, &dump.filename);
        tracing::debug!(
            cache_name = %self.cache_name,
            path = %path.display(),
            "a usable cache dump found"
        );

        let contents = {
            let path = path.clone();
            self.fs_pool.run(move || fs::read_file(&path)).await
        };

        match contents {
            Ok(contents) => Some(DumpContents {
                contents,
                update_time: dump.update_time,
            }),
            Err(err) => {
                tracing::error!(
                    cache_name = %self.cache_name,
                    path = %path.display(),
                    %err,
                    "error while reading the contents of a cache dump"
                );
                None
            }
        }
    }

    /// Record a later known-fresh time for an existing dump by renaming it.
    ///
    /// Far cheaper than rewriting when the cache contents have not changed:
    /// the filename is the authoritative index, so the rename alone updates
    /// the perceived update time. Returns `false` when the old dump has
    /// disappeared (the caller should produce a fresh dump) or when the
    /// rename fails.
    ///
    /// `old_update_time` must not exceed `new_update_time`.
    pub async fn bump_dump_time(
        &self,
        old_update_time: DateTime<Utc>,
        new_update_time: DateTime<Utc>,
    ) -> bool {
        debug_assert!(old_update_time <= new_update_time);
        let config = self.config.read();

        let old_path = dump_path_for(old_update_time, &config);
        let new_path = dump_path_for(new_update_time, &config);

        let result = {
            let (old_path, new_path) = (old_path.clone(), new_path.clone());
            self.fs_pool
                .run(move || {
                    if !old_path.exists() {
                        return Ok(false);
                    }
                    fs::rename(&old_path, &new_path)?;
                    Ok(true)
                })
                .await
        };

        match result {
            Ok(true) => {
                tracing::info!(
                    cache_name = %self.cache_name,
                    old_path = %old_path.display(),
                    new_path = %new_path.display(),
                    "renamed cache dump"
                );
                true
            }
            Ok(false) => {
                tracing::warn!(
                    cache_name = %self.cache_name,
                    old_path = %old_path.display(),
                    "the previous cache dump has suddenly disappeared; a new dump will be created"
                );
                false
            }
            Err(err) => {
                tracing::error!(
                    cache_name = %self.cache_name,
                    old_path = %old_path.display(),
                    new_path = %new_path.display(),
                    %err,
                    "error while renaming a cache dump"
                );
                false
            }
        }
    }

    /// Reconcile the dump directory against the retention policy.
    ///
    /// Removes every stray `*.tmp` file, every dump whose format version is
    /// older than the configured one or whose age exceeds `max_dump_age`,
    /// and the oldest current-version dumps beyond `max_dump_count`. Dumps
    /// with a newer format version are left untouched so that a rolling
    /// downgrade loses no data. Individual unlink failures are logged and do
    /// not abort the sweep.
    pub async fn cleanup(&self) {
        let config = self.config.read();

        let swept = {
            let config = Arc::clone(&config);
            let cache_name = self.cache_name.clone();
            self.fs_pool
                .run(move || {
                    cleanup_blocking(&config, &cache_name);
                    Ok(())
                })
                .await
        };
        if let Err(err) = swept {
            tracing::error!(
                cache_name = %self.cache_name,
                %err,
                "error while cleaning up old cache dumps"
            );
        }

        self.config.cleanup();
    }

    /// Publish a new policy configuration. Never blocks readers.
    pub fn set_config(&self, config: CacheConfigStatic) {
        self.config.assign(config);
    }
}

/// Full path of the dump for `update_time` under the current config.
fn dump_path_for(update_time: DateTime<Utc>, config: &CacheConfigStatic) -> PathBuf {
    filename::dump_path(
        &config.dump_directory,
        &filename::dump_name(
            filename::round_time(update_time),
            config.dump_format_version,
        ),
    )
}

/// Oldest update time still acceptable under `max_dump_age`, or `None` when
/// there is no age limit. Computed from rounded `now()` so the cutoff is
/// comparable with times parsed back from filenames.
fn min_acceptable_update_time(config: &CacheConfigStatic) -> Option<DateTime<Utc>> {
    let max_age = config.max_dump_age?;
    // An age too large to represent puts the cutoff before any storable
    // time, which is the same as having no age limit.
    let max_age = TimeDelta::from_std(max_age).ok()?;
    filename::round_time(Utc::now()).checked_sub_signed(max_age)
}

/// Pick the freshest dump satisfying the version and age policy.
fn select_latest(config: &CacheConfigStatic) -> Option<ParsedDumpName> {
    let min_update_time = min_acceptable_update_time(config);
    let listing = scan::classify_dir(&config.dump_directory);

    let mut best: Option<ParsedDumpName> = None;
    for dump in listing.dumps {
        if dump.format_version != config.dump_format_version {
            tracing::debug!(
                filename = %dump.filename,
                version = dump.format_version,
                current_version = config.dump_format_version,
                "ignoring a dump with a different format version"
            );
            continue;
        }
        if let Some(min) = min_update_time {
            if dump.update_time < min {
                tracing::debug!(
                    filename = %dump.filename,
                    "ignoring a dump older than the maximum allowed age"
                );
                continue;
            }
        }
        let better = match &best {
            None => true,
            Some(current) => {
                dump.update_time > current.update_time
                    || (dump.update_time == current.update_time
                        && dump.filename > current.filename)
            }
        };
        if better {
            best = Some(dump);
        }
    }
    best
}

fn cleanup_blocking(config: &CacheConfigStatic, cache_name: &str) {
    let min_update_time = min_acceptable_update_time(config);
    let listing = scan::classify_dir(&config.dump_directory);

    for tmp_path in listing.stray_tmp {
        tracing::debug!(
            cache_name,
            path = %tmp_path.display(),
            "removing a leftover tmp file"
        );
        if let Err(err) = fs::remove_file(&tmp_path) {
            tracing::error!(
                cache_name,
                path = %tmp_path.display(),
                %err,
                "failed to remove a leftover tmp file"
            );
        }
    }

    let mut survivors = Vec::new();
    for dump in listing.dumps {
        let expired = dump.format_version < config.dump_format_version
            || min_update_time.is_some_and(|min| dump.update_time < min);
        if expired {
            let path = filename::dump_path(&config.dump_directory, &dump.filename);
            tracing::debug!(cache_name, path = %path.display(), "removing an expired dump");
            if let Err(err) = fs::remove_file(&path) {
                tracing::error!(
                    cache_name,
                    path = %path.display(),
                    %err,
                    "failed to remove an expired dump"
                );
            }
            continue;
        }
        if dump.format_version == config.dump_format_version {
            survivors.push(dump);
        }
        // Dumps with a newer format version are neither retained nor
        // removed, so a rolling downgrade loses no data.
    }

    survivors.sort_by(|a, b| {
        b.update_time
            .cmp(&a.update_time)
            .then_with(|| b.filename.cmp(&a.filename))
    });
    for dump in survivors.iter().skip(config.max_dump_count) {
        let path = filename::dump_path(&config.dump_directory, &dump.filename);
        tracing::debug!(cache_name, path = %path.display(), "removing an excessive dump");
        if let Err(err) = fs::remove_file(&path) {
            tracing::error!(
                cache_name,
                path = %path.display(),
                %err,
                "failed to remove an excessive dump"
            );
        }
    }
}
