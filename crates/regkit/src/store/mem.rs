//! # In-memory registry
//!
//! A registry tree held in memory, optionally backed by a YAML snapshot file.
//! Every write is saved back to that file. Child keys keep the order they were
//! inserted in, which is the order enumeration reports them in.
//!
//! Snapshot format:
//! ```yaml
//! HKEY_LOCAL_MACHINE:
//!   keys:
//!     SOFTWARE:
//!       keys:
//!         TEST:
//!           values:
//!             Name:
//!               type: REG_SZ
//!               data: hello
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{Access, Disposition, Hive, RegValue, Registry, RegistryKey, StoreError, StoreResult};
use crate::path::KeyPath;

/// One key of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemKey {
    /// Named values of this key.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, RegValue>,
    /// Child keys, in enumeration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub keys: IndexMap<String, MemKey>,
}

impl MemKey {
    fn get(&self, path: &KeyPath) -> Option<&MemKey> {
        path.segments()
            .iter()
            .try_fold(self, |key, segment| key.keys.get(segment))
    }

    /// Walk to `path`, creating what's missing. Reports whether the last
    /// segment had to be created.
    fn get_or_create(&mut self, path: &KeyPath) -> (&mut MemKey, Disposition) {
        let mut disposition = Disposition::OpenedExisting;
        let mut key = self;
        for segment in path.segments() {
            disposition = if key.keys.contains_key(segment) {
                Disposition::OpenedExisting
            } else {
                Disposition::CreatedNew
            };
            key = key.keys.entry(segment.clone()).or_default();
        }
        (key, disposition)
    }
}

/// A whole registry: one root key per hive.
pub type Snapshot = IndexMap<Hive, MemKey>;

#[derive(Debug, Default)]
struct Inner {
    tree: Mutex<Snapshot>,
    file: Option<PathBuf>,
    denied: Mutex<HashSet<(Hive, KeyPath)>>,
    open_handles: AtomicUsize,
}

/// In-memory [`Registry`]. Cloning shares the same tree.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    inner: Arc<Inner>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(Snapshot::new())
    }
}

impl MemoryRegistry {
    /// A registry holding `snapshot`, not backed by a file.
    pub fn new(snapshot: Snapshot) -> Self {
        Self::with_file(snapshot, None)
    }

    fn with_file(mut snapshot: Snapshot, file: Option<PathBuf>) -> Self {
        for hive in Hive::ALL {
            snapshot.entry(hive).or_default();
        }
        Self {
            inner: Arc::new(Inner {
                tree: Mutex::new(snapshot),
                file,
                ..Default::default()
            }),
        }
    }

    /// A registry with the given keys under `hive`.
    /// Each path is created along with its parents, in the order given.
    pub fn from_paths<'a>(hive: Hive, paths: impl IntoIterator<Item = &'a str>) -> Self {
        let registry = Self::default();
        {
            let mut tree = registry.inner.tree.lock();
            let root = tree.entry(hive).or_default();
            for path in paths {
                root.get_or_create(&KeyPath::parse(path));
            }
        }
        registry
    }

    /// Load a snapshot file. Writes will be saved back to it.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.display().to_string())
            } else {
                err.into()
            }
        })?;
        let snapshot: Snapshot = serde_yaml::from_str(&yaml)?;
        tracing::debug!(path = %path.display(), "loaded registry snapshot");
        Ok(Self::with_file(snapshot, Some(path.to_path_buf())))
    }

    /// Write the tree to the backing file, if there is one.
    pub fn save(&self) -> StoreResult<()> {
        let Some(file) = &self.inner.file else {
            return Ok(());
        };
        let yaml = serde_yaml::to_string(&*self.inner.tree.lock())?;
        std::fs::write(file, yaml)?;
        Ok(())
    }

    /// A copy of the current tree.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.tree.lock().clone()
    }

    /// Make every attempt to open `hive\path` fail with access denied.
    pub fn deny(&self, hive: Hive, path: &KeyPath) {
        self.inner.denied.lock().insert((hive, path.clone()));
    }

    /// Number of keys currently open.
    pub fn open_handles(&self) -> usize {
        self.inner.open_handles.load(Ordering::SeqCst)
    }

    fn handle(&self, hive: Hive, path: KeyPath) -> StoreResult<MemoryKey> {
        let name = hive.key_name(&path);
        if self.inner.denied.lock().contains(&(hive, path.clone())) {
            return Err(StoreError::AccessDenied(name));
        }
        let exists = self
            .inner
            .tree
            .lock()
            .get(&hive)
            .and_then(|root| root.get(&path))
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(name));
        }
        self.inner.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryKey {
            registry: self.clone(),
            hive,
            path,
        })
    }
}

impl Registry for MemoryRegistry {
    type Key = MemoryKey;

    fn hive(&self, hive: Hive) -> StoreResult<MemoryKey> {
        self.handle(hive, KeyPath::root())
    }
}

/// An open key of a [`MemoryRegistry`].
#[derive(Debug)]
pub struct MemoryKey {
    registry: MemoryRegistry,
    hive: Hive,
    path: KeyPath,
}

impl RegistryKey for MemoryKey {
    fn open(&self, path: &KeyPath, _access: Access) -> StoreResult<Self> {
        self.registry.handle(self.hive, self.path.concat(path))
    }

    fn enum_child(&self, index: u32) -> StoreResult<Option<String>> {
        let tree = self.registry.inner.tree.lock();
        let key = tree
            .get(&self.hive)
            .and_then(|root| root.get(&self.path))
            .ok_or_else(|| StoreError::NotFound(self.hive.key_name(&self.path)))?;
        Ok(key
            .keys
            .get_index(index as usize)
            .map(|(name, _)| name.clone()))
    }

    fn create(&self, path: &KeyPath) -> StoreResult<Disposition> {
        let disposition = {
            let mut tree = self.registry.inner.tree.lock();
            let root = tree.entry(self.hive).or_default();
            root.get_or_create(&self.path.concat(path)).1
        };
        self.registry.save()?;
        Ok(disposition)
    }

    fn set_value(&self, path: &KeyPath, name: &str, value: &RegValue) -> StoreResult<()> {
        {
            let mut tree = self.registry.inner.tree.lock();
            let root = tree.entry(self.hive).or_default();
            let (key, _) = root.get_or_create(&self.path.concat(path));
            key.values.insert(name.to_string(), value.clone());
        }
        self.registry.save()
    }

    fn watch(&self, _subtree: bool) -> StoreResult<()> {
        Err(StoreError::Unsupported("watching for changes"))
    }
}

impl Drop for MemoryKey {
    fn drop(&mut self) {
        self.registry
            .inner
            .open_handles
            .fetch_sub(1, Ordering::SeqCst);
    }
}
