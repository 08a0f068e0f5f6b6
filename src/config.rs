//! Dump policy configuration and its read-copy holder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Static dump policy for a single cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfigStatic {
    /// Absolute directory containing this cache's dumps
    pub dump_directory: PathBuf,
    /// Serialization schema version the cache currently understands
    pub dump_format_version: u64,
    /// Dumps older than this are unusable; `None` disables the age limit
    pub max_dump_age: Option<Duration>,
    /// Maximum number of usable dumps kept after cleanup
    pub max_dump_count: usize,
}

/// Read-copy cell holding the current [`CacheConfigStatic`].
///
/// Readers take a cheap snapshot via [`read`](Self::read) and keep observing
/// it for the whole scope of the returned handle, even across a concurrent
/// [`assign`](Self::assign). Superseded generations are parked until
/// [`cleanup`](Self::cleanup) observes that no reader holds them any more.
#[derive(Debug)]
pub struct ConfigCell {
    current: RwLock<Arc<CacheConfigStatic>>,
    retired: Mutex<Vec<Arc<CacheConfigStatic>>>,
}

impl ConfigCell {
    /// Create a cell holding `config` as the current generation.
    #[must_use]
    pub fn new(config: CacheConfigStatic) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot the current configuration.
    ///
    /// The returned handle pins its generation; it stays valid and unchanged
    /// no matter how many times [`assign`](Self::assign) runs afterwards.
    #[must_use]
    pub fn read(&self) -> Arc<CacheConfigStatic> {
        let current = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Publish a new configuration.
    ///
    /// The previous generation is retired, not dropped: readers that already
    /// hold it keep using it until their handles go out of scope.
    pub fn assign(&self, config: CacheConfigStatic) {
        let fresh = Arc::new(config);
        let previous = {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, fresh)
        };
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(previous);
    }

    /// Drop retired generations that no reader references any more.
    pub fn cleanup(&self) {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|generation| Arc::strong_count(generation) > 1);
    }

    #[cfg(test)]
    fn retired_count(&self) -> usize {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(version: u64) -> CacheConfigStatic {
        CacheConfigStatic {
            dump_directory: PathBuf::from("/var/cache/dumps"),
            dump_format_version: version,
            max_dump_age: Some(Duration::from_secs(3600)),
            max_dump_count: 5,
        }
    }

    #[test]
    fn test_read_returns_current() {
        let cell = ConfigCell::new(config(1));
        assert_eq!(cell.read().dump_format_version, 1);
    }

    #[test]
    fn test_reader_pins_generation_across_assign() {
        let cell = ConfigCell::new(config(1));
        let snapshot = cell.read();

        cell.assign(config(2));

        // The old handle still sees the generation it pinned.
        assert_eq!(snapshot.dump_format_version, 1);
        // A fresh read sees the new one.
        assert_eq!(cell.read().dump_format_version, 2);
    }

    #[test]
    fn test_cleanup_keeps_held_generations() {
        let cell = ConfigCell::new(config(1));
        let held = cell.read();

        cell.assign(config(2));
        cell.assign(config(3));
        assert_eq!(cell.retired_count(), 2);

        cell.cleanup();
        // Generation 1 is still held by `held`; generation 2 is not.
        assert_eq!(cell.retired_count(), 1);
        assert_eq!(held.dump_format_version, 1);

        drop(held);
        cell.cleanup();
        assert_eq!(cell.retired_count(), 0);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let original = config(7);
        let json = serde_json::to_string(&original).unwrap();
        let restored: CacheConfigStatic = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.dump_format_version, 7);
        assert_eq!(restored.dump_directory, original.dump_directory);
        assert_eq!(restored.max_dump_age, original.max_dump_age);
        assert_eq!(restored.max_dump_count, original.max_dump_count);
    }
}
