//! Session backend.
//!
//! An in-process string map that vanishes when the process exits. Used only
//! as the backup tier when the key-value backend is already the primary.

use std::collections::HashMap;

#[derive(Default)]
pub struct SessionBackend {
    entries: HashMap<String, String>,
}

impl SessionBackend {
    pub fn new() -> Self {
        SessionBackend::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}
