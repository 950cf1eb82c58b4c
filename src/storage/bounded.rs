//! Fixed-capacity FIFO log.
//!
//! Pushing past `CAP` evicts the oldest entry. Serializes as a plain JSON
//! array; deserializing a longer array keeps only the newest `CAP` items.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundedLog<T, const CAP: usize> {
    items: VecDeque<T>,
}

impl<T, const CAP: usize> BoundedLog<T, CAP> {
    pub const CAPACITY: usize = CAP;

    pub fn new() -> Self {
        Self { items: VecDeque::new() }
    }

    /// Append, evicting the oldest entry when full. Returns the evicted item.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= CAP {
            self.items.pop_front()
        } else {
            None
        };
        if CAP > 0 {
            self.items.push_back(item);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The newest `n` items, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T, const CAP: usize> Default for BoundedLog<T, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAP: usize> FromIterator<T> for BoundedLog<T, CAP> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut log = Self::new();
        for item in iter {
            log.push(item);
        }
        log
    }
}

impl<T: Serialize, const CAP: usize> Serialize for BoundedLog<T, CAP> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

impl<'de, T: Deserialize<'de>, const CAP: usize> Deserialize<'de> for BoundedLog<T, CAP> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}
