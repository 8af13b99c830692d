//! # Paginated Collections
//!
//! One page of results plus what is needed to reason about the others. The service does not
//! send counts; the total number of pages is read from the page number in the `last` link
//! (falling back to `self`), and the total number of entries is derived from that:
//!
//! ```text
//! last page:   total_entries = (total_pages - 1) * per_page + items on this page
//! other pages: total_entries = (total_pages - 1) * per_page + per_page / 2
//! ```
//!
//! Only the last page knows its own size; from anywhere else the last page is guessed to be
//! half full.

use serde_json::Value;
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::framework::error::{OrmError, Result};

const PAGE_NUMBER_MARKERS: [&str; 2] = ["page%5bnumber%5d=", "page[number]="];

/// Page number from a pagination link, e.g. `...?page%5Bnumber%5D=7&page%5Bsize%5D=25`.
pub fn page_number_from_link(link: &str) -> Option<u32> {
    let lower = link.to_ascii_lowercase();
    PAGE_NUMBER_MARKERS.iter().find_map(|marker| {
        let start = lower.find(marker)? + marker.len();
        let digits: String = lower[start..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    })
}

#[derive(Debug, Clone)]
pub struct PaginatedCollection<T> {
    items: Vec<T>,
    metadata: Value,
    errors: Vec<Value>,
    links: BTreeMap<String, String>,
    current_page: u32,
    per_page: u32,
    total_pages: OnceCell<u32>,
    total_entries: OnceCell<u64>,
}

impl<T> PaginatedCollection<T> {
    /// Fails with [`OrmError::Range`] when `current_page` or `per_page` is below 1.
    pub fn new(items: Vec<T>, current_page: u32, per_page: u32) -> Result<Self> {
        if current_page < 1 {
            return Err(OrmError::Range(format!(
                "current_page must be at least 1, got {current_page}"
            )));
        }
        if per_page < 1 {
            return Err(OrmError::Range(format!(
                "per_page must be at least 1, got {per_page}"
            )));
        }
        Ok(Self {
            items,
            metadata: Value::Object(Default::default()),
            errors: Vec::new(),
            links: BTreeMap::new(),
            current_page,
            per_page,
            total_pages: OnceCell::new(),
            total_entries: OnceCell::new(),
        })
    }

    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.items = items;
        self.total_entries = OnceCell::new();
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_errors(mut self, errors: Vec<Value>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_links(mut self, links: BTreeMap<String, String>) -> Self {
        self.links = links;
        self.total_pages = OnceCell::new();
        self.total_entries = OnceCell::new();
        self
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn errors(&self) -> &[Value] {
        &self.errors
    }

    pub fn links(&self) -> &BTreeMap<String, String> {
        &self.links
    }

    /// Number of entries before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page - 1) * u64::from(self.per_page)
    }

    pub fn total_pages(&self) -> u32 {
        *self.total_pages.get_or_init(|| {
            ["last", "self"]
                .iter()
                .filter_map(|rel| self.links.get(*rel))
                .find_map(|link| page_number_from_link(link))
                .unwrap_or(1)
        })
    }

    pub fn total_entries(&self) -> u64 {
        *self.total_entries.get_or_init(|| {
            let total_pages = self.total_pages();
            let before_last = u64::from(total_pages.saturating_sub(1)) * u64::from(self.per_page);
            if self.current_page == total_pages {
                before_last + self.items.len() as u64
            } else {
                before_last + u64::from(self.per_page / 2)
            }
        })
    }

    pub fn out_of_bounds(&self) -> bool {
        self.current_page > self.total_pages()
    }

    pub fn previous_page(&self) -> Option<u32> {
        (self.current_page > 1).then(|| self.current_page - 1)
    }

    pub fn next_page(&self) -> Option<u32> {
        (self.current_page < self.total_pages()).then(|| self.current_page + 1)
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
        self.total_entries = OnceCell::new();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(compare);
    }

    pub fn sort_by_key<K, F>(&mut self, key: F)
    where
        F: FnMut(&T) -> K,
        K: Ord,
    {
        self.items.sort_by_key(key);
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Clone> PaginatedCollection<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}

impl<T> IntoIterator for PaginatedCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PaginatedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
