//! Type registry — memoized synthesis per (type, configuration)
//!
//! Each key owns a `OnceCell`. Concurrent first requests for the same key
//! block on the cell while one of them builds; all of them receive the
//! winner's value. A failed build leaves the cell empty, so nothing is
//! cached and the next request builds again.

use crate::error::{InterceptError, Result};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Registry key: proxy type name, source shape and options fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub type_name: String,
    pub fingerprint: String,
    /// Structural fingerprint of the source descriptor
    pub shape: String,
}

impl RegistryKey {
    pub fn new(type_name: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fingerprint: fingerprint.into(),
            shape: String::new(),
        }
    }

    pub fn with_shape(mut self, shape: impl Into<String>) -> Self {
        self.shape = shape.into();
        self
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.fingerprint)
    }
}

/// Exactly-once cache of immutable values
pub struct TypeRegistry<V> {
    entries: RwLock<HashMap<RegistryKey, Arc<OnceCell<Arc<V>>>>>,
}

impl<V> Default for TypeRegistry<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> TypeRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, building it with `build` on first access
    ///
    /// Returns the value and whether this call built it.
    pub fn get_or_add<F>(&self, key: RegistryKey, build: F) -> Result<(Arc<V>, bool)>
    where
        F: FnOnce() -> Result<V>,
    {
        let cell = self.cell(key)?;
        let mut built = false;
        let value = cell.get_or_try_init(|| {
            built = true;
            build().map(Arc::new)
        })?;
        Ok((Arc::clone(value), built))
    }

    /// Published value for `key`, if any
    pub fn get(&self, key: &RegistryKey) -> Result<Option<Arc<V>>> {
        let entries = self.entries.read().map_err(|e| {
            InterceptError::Registry(format!("Type registry lock poisoned: {}", e))
        })?;
        Ok(entries.get(key).and_then(|cell| cell.get().cloned()))
    }

    /// Number of published values
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.values().filter(|cell| cell.get().is_some()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, key: RegistryKey) -> Result<Arc<OnceCell<Arc<V>>>> {
        {
            let entries = self.entries.read().map_err(|e| {
                InterceptError::Registry(format!("Type registry lock poisoned: {}", e))
            })?;
            if let Some(cell) = entries.get(&key) {
                return Ok(Arc::clone(cell));
            }
        }

        let mut entries = self.entries.write().map_err(|e| {
            InterceptError::Registry(format!("Type registry lock poisoned: {}", e))
        })?;
        Ok(Arc::clone(entries.entry(key).or_default()))
    }
}

impl<V> fmt::Debug for TypeRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("published", &self.len())
            .finish()
    }
}
