//! Ordered key/value header table for user-supplied request headers.
//!
//! Grounded on `websocket_service.c`'s `websocket_kv_table_init`/`_alloc`/
//! `kv_put`/`kv_find`: an array-backed table, last-write-wins on a matching
//! key, growing in blocks of [`GROWTH_INCREMENT`] entries once full rather
//! than the usual amortized-doubling `Vec` growth, since the spec treats
//! that fixed increment as an observable capacity-planning knob (default
//! [`crate::config::DEFAULT_KV_TABLE_LENGTH`]), not an implementation detail.

use crate::error::Error;

pub const GROWTH_INCREMENT: usize = 20;

#[derive(Debug, Clone)]
pub struct HeaderTable {
    entries: Vec<(String, String)>,
    capacity: usize,
}

impl HeaderTable {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(initial_capacity),
            capacity: initial_capacity,
        }
    }

    /// Inserts or overwrites `key`. Grows the table by [`GROWTH_INCREMENT`]
    /// once the configured capacity is exhausted rather than failing.
    pub fn put(&mut self, key: &str, value: &str) -> Result<(), Error> {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            self.capacity += GROWTH_INCREMENT;
        }
        self.entries.push((key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn find(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HeaderTable {
    fn default() -> Self {
        Self::new(GROWTH_INCREMENT)
    }
}
