//! Test fixtures and platform helpers.
//!
//! Provides in-memory and temp-dir platforms whose store counters stay
//! reachable from the test.

use spnet_core::{Entity, NewEntity};
use spnet_model::Platform;
use spnet_store::{FileStore, InMemoryStore, StoreStats};
use spnet_value::doc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

enum Backing {
    Memory(Arc<InMemoryStore>),
    File(Arc<FileStore>),
}

/// A test platform with automatic cleanup.
pub struct TestPlatform {
    /// The platform instance.
    pub platform: Platform,
    backing: Backing,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestPlatform {
    /// Creates a new in-memory test platform.
    pub fn memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let platform = Platform::with_store(store.clone())
            .expect("Failed to open in-memory platform");
        Self {
            platform,
            backing: Backing::Memory(store),
            _temp_dir: None,
        }
    }

    /// Creates a new platform persisted in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (platform, store) = open_file(&temp_dir.path().join("store"));
        Self {
            platform,
            backing: Backing::File(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Closes a file-backed platform and opens it again from disk.
    ///
    /// # Panics
    ///
    /// Panics for in-memory platforms.
    pub fn reopen(self) -> Self {
        let Self {
            platform,
            backing,
            _temp_dir,
        } = self;
        let path = match &backing {
            Backing::File(store) => store.path().to_path_buf(),
            Backing::Memory(_) => panic!("in-memory platforms cannot be reopened"),
        };
        drop(platform);
        drop(backing);
        let (platform, store) = open_file(&path);
        Self {
            platform,
            backing: Backing::File(store),
            _temp_dir,
        }
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        match &self.backing {
            Backing::File(store) => Some(store.path().to_path_buf()),
            Backing::Memory(_) => None,
        }
    }

    /// Operation counters of the backing store.
    pub fn stats(&self) -> &StoreStats {
        match &self.backing {
            Backing::Memory(store) => store.stats(),
            Backing::File(store) => store.stats(),
        }
    }

    /// Inserts a person called `name`.
    pub fn person(&self, name: &str) -> Entity {
        self.platform
            .mapper()
            .insert(self.kinds().person, NewEntity::new(doc! { "name" => name }))
            .expect("Failed to insert person")
    }

    /// Inserts a paper titled `title`.
    pub fn paper(&self, title: &str) -> Entity {
        self.platform
            .mapper()
            .insert(self.kinds().paper, NewEntity::new(doc! { "title" => title }))
            .expect("Failed to insert paper")
    }
}

fn open_file(path: &Path) -> (Platform, Arc<FileStore>) {
    let store = Arc::new(FileStore::open(path).expect("Failed to open file store"));
    let platform = Platform::with_store(store.clone()).expect("Failed to open file platform");
    (platform, store)
}

impl std::ops::Deref for TestPlatform {
    type Target = Platform;

    fn deref(&self) -> &Self::Target {
        &self.platform
    }
}

/// Runs a test with a temporary in-memory platform.
///
/// # Example
///
/// ```rust
/// use spnet_testkit::with_platform;
/// use spnet_value::Value;
///
/// with_platform(|platform| {
///     let topic = platform.topic("cosmology").unwrap();
///     assert_eq!(topic.key_value(), Value::from("cosmology"));
/// });
/// ```
pub fn with_platform<F, R>(f: F) -> R
where
    F: FnOnce(&TestPlatform) -> R,
{
    let test_platform = TestPlatform::memory();
    f(&test_platform)
}

/// Runs a test with a temporary file-based platform.
pub fn with_file_platform<F, R>(f: F) -> R
where
    F: FnOnce(&TestPlatform, &Path) -> R,
{
    let test_platform = TestPlatform::file();
    let path = test_platform.path().expect("File platform should have a path");
    f(&test_platform, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spnet_value::Value;

    #[test]
    fn memory_platform_counts_reads() {
        let platform = TestPlatform::memory();
        let paper = platform.paper("X");
        let before = platform.stats().reads();
        platform
            .mapper()
            .fetch(platform.kinds().paper, paper.key().cloned().unwrap())
            .unwrap();
        assert_eq!(platform.stats().reads(), before + 1);
        assert!(platform.path().is_none());
    }

    #[test]
    fn file_platform_survives_reopen() {
        let platform = TestPlatform::file();
        let key = platform.person("fred").key().cloned().unwrap();
        let platform = platform.reopen();
        let fred = platform.mapper().fetch(platform.kinds().person, key).unwrap();
        assert_eq!(fred.get("name"), Some(&Value::from("fred")));
    }
}
