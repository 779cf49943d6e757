//! Identity-keyed memoization of arrays derived from a source array.

use std::collections::{HashMap, HashSet};

use super::signals::ArrayId;

/// Caches one derived value per source array.
///
/// A lookup hits only when both the source [`ArrayId`] and the parameter match
/// the stored entry. Storing with a new parameter replaces the entry, so a
/// changed parameter naturally invalidates the old result.
#[derive(Debug)]
pub struct IdentityCache<P, V> {
    entries: HashMap<ArrayId, (P, V)>,
}

impl<P, V> Default for IdentityCache<P, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<P: PartialEq, V> IdentityCache<P, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: ArrayId, param: &P) -> Option<&V> {
        match self.entries.get(&source) {
            Some((p, v)) if p == param => Some(v),
            _ => None,
        }
    }

    pub fn set(&mut self, source: ArrayId, param: P, value: V) {
        self.entries.insert(source, (param, value));
    }

    /// Returns the cached value, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, source: ArrayId, param: P, compute: impl FnOnce() -> V) -> &V {
        let hit = matches!(self.entries.get(&source), Some((p, _)) if *p == param);
        if !hit {
            let value = compute();
            self.entries.insert(source, (param, value));
        }
        &self.entries[&source].1
    }

    /// Drop entries whose source array is no longer live.
    pub fn retain_sources(&mut self, live: &HashSet<ArrayId>) {
        self.entries.retain(|id, _| live.contains(id));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_requires_same_parameter() {
        let mut cache = IdentityCache::new();
        cache.set(ArrayId(1), 0.5, "a");
        assert_eq!(cache.get(ArrayId(1), &0.5), Some(&"a"));
        assert_eq!(cache.get(ArrayId(1), &0.25), None);
        assert_eq!(cache.get(ArrayId(2), &0.5), None);
    }

    #[test]
    fn new_parameter_replaces_entry() {
        let mut cache = IdentityCache::new();
        cache.set(ArrayId(1), 1, "one");
        cache.set(ArrayId(1), 2, "two");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(ArrayId(1), &1), None);
        assert_eq!(cache.get(ArrayId(1), &2), Some(&"two"));
    }

    #[test]
    fn get_or_insert_computes_once() {
        let mut cache = IdentityCache::new();
        let mut calls = 0;
        cache.get_or_insert_with(ArrayId(3), (), || {
            calls += 1;
            7
        });
        let v = *cache.get_or_insert_with(ArrayId(3), (), || {
            calls += 1;
            8
        });
        assert_eq!(v, 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn retain_drops_dead_sources() {
        let mut cache = IdentityCache::new();
        cache.set(ArrayId(1), (), 1);
        cache.set(ArrayId(2), (), 2);
        cache.retain_sources(&HashSet::from([ArrayId(2)]));
        assert_eq!(cache.get(ArrayId(1), &()), None);
        assert_eq!(cache.get(ArrayId(2), &()), Some(&2));
    }
}
