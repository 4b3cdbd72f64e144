// ABOUTME: Value-based URL deduplication for media buckets.
// ABOUTME: Keeps the first record per URL and silently drops later duplicates.

use std::collections::HashSet;

use crate::model::{MediaRecord, VideoRecord};

/// Anything keyed by its URL for deduplication purposes.
pub trait UrlKeyed {
    fn url_key(&self) -> &str;
}

impl UrlKeyed for MediaRecord {
    fn url_key(&self) -> &str {
        &self.url
    }
}

impl UrlKeyed for VideoRecord {
    fn url_key(&self) -> &str {
        &self.url
    }
}

/// An ordered bucket that admits each URL once.
#[derive(Debug, Clone)]
pub struct UrlBucket<T> {
    items: Vec<T>,
    seen: HashSet<String>,
}

impl<T: UrlKeyed> UrlBucket<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Adds `item` unless its URL was already admitted. Returns whether it was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.seen.contains(item.url_key()) {
            return false;
        }
        self.seen.insert(item.url_key().to_string());
        self.items.push(item);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: UrlKeyed> Default for UrlBucket<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: UrlKeyed> Extend<T> for UrlBucket<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
