//! Memoizing object registry.
//!
//! Maps keys to shared objects created on first request. Creation runs inside
//! the registry's critical section, so a factory executes at most once per key
//! even when many threads ask for the same key concurrently.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

/// Thread-safe get-or-create registry.
///
/// Entries are never evicted; the registry lives as long as its owner.
/// Factories must not call back into the same registry.
pub struct ObjectsRegistry<K, V> {
    objects: Mutex<HashMap<K, V>>,
}

impl<K, V> ObjectsRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Get an existing object.
    #[inline]
    pub fn get(&self, key: &K) -> Option<V> {
        self.objects.lock().get(key).cloned()
    }

    /// Get the object for `key`, creating it with `create` if absent.
    ///
    /// A failed factory leaves no entry behind, so a later call retries.
    pub fn get_or_try_insert_with<E, F>(&self, key: &K, create: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut objects = self.objects.lock();
        if let Some(object) = objects.get(key) {
            return Ok(object.clone());
        }

        let object = create()?;
        objects.insert(key.clone(), object.clone());
        Ok(object)
    }

    /// Infallible variant of [`Self::get_or_try_insert_with`].
    pub fn get_or_insert_with<F>(&self, key: &K, create: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.get_or_try_insert_with::<std::convert::Infallible, _>(key, || Ok(create())) {
            Ok(object) => object,
            Err(never) => match never {},
        }
    }

    /// Get the number of registered objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Check if the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for ObjectsRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for ObjectsRegistry<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectsRegistry")
            .field("len", &self.objects.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_get_or_insert() {
        let registry: ObjectsRegistry<u32, Arc<String>> = ObjectsRegistry::new();
        assert!(registry.get(&1).is_none());

        let a = registry.get_or_insert_with(&1, || Arc::new("one".to_string()));
        let b = registry.get_or_insert_with(&1, || Arc::new("other".to_string()));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_factory_not_cached() {
        let registry: ObjectsRegistry<u32, u32> = ObjectsRegistry::new();
        let res: Result<u32, &str> = registry.get_or_try_insert_with(&5, || Err("boom"));
        assert!(res.is_err());
        assert!(registry.is_empty());

        let res: Result<u32, &str> = registry.get_or_try_insert_with(&5, || Ok(50));
        assert_eq!(res, Ok(50));
    }

    #[test]
    fn test_concurrent_single_construction() {
        let registry: ObjectsRegistry<Vec<i32>, Arc<usize>> = ObjectsRegistry::new();
        let calls = AtomicUsize::new(0);
        let key = vec![1, 2, 3];

        let results: Vec<Arc<usize>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        registry.get_or_insert_with(&key, || {
                            let n = calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Arc::new(n)
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
