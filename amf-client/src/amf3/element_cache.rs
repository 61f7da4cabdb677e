use crate::amf3::length::Length;
use std::collections::HashMap;
use std::hash::Hash;

/// Abstraction over the Amf3 caching mechanism, entries are numbered in insertion order
#[derive(Clone, Debug)]
pub(crate) struct ElementCache<T> {
    cache: HashMap<T, usize>,
}

impl<T> Default for ElementCache<T> {
    fn default() -> Self {
        ElementCache {
            cache: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash> ElementCache<T> {
    /// Add the given item to the cache, if the item already exists will do nothing
    #[inline]
    pub(crate) fn store(&mut self, val: T) {
        let next = self.cache.len();
        self.cache.entry(val).or_insert(next);
    }

    /// Retrieve the index for the given value
    #[inline]
    pub(crate) fn get_index(&self, val: &T) -> Option<usize> {
        self.cache.get(val).copied()
    }

    /// Get a Length reference to an item in the cache
    /// If the item exists, will return a `Length::Reference` to the item
    /// If the item does not exist, will return the given size as `Length::Size`
    pub(crate) fn to_length(&self, val: &T, length: u32) -> Length {
        match self.get_index(val) {
            Some(i) => Length::Reference(i),
            None => Length::Size(length),
        }
    }

    /// See #to_length, except will store the given value after retrieving the index (if it does not already exist)
    pub(crate) fn to_length_store(&mut self, val: T, length: u32) -> Length {
        let len = self.to_length(&val, length);
        self.store(val);
        len
    }
}

#[cfg(test)]
mod tests {
    use super::ElementCache;
    use crate::amf3::length::Length;

    #[test]
    fn second_store_becomes_a_reference() {
        let mut cache = ElementCache::default();
        assert_eq!(cache.to_length_store("a".to_string(), 1), Length::Size(1));
        assert_eq!(cache.to_length_store("b".to_string(), 1), Length::Size(1));
        assert_eq!(cache.to_length_store("a".to_string(), 1), Length::Reference(0));
        assert_eq!(cache.get_index(&"b".to_string()), Some(1));
    }
}
