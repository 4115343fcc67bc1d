//! Session-scoped memo of device queries.

use std::collections::HashMap;
use std::future::Future;

use log::trace;
use serde_json::Value;

pub const DEVICE_INFO: &str = "device_info";
pub const PIXEL_RATIO: &str = "pixel_ratio";
pub const STAT_BAR_HEIGHT: &str = "stat_bar_height";
pub const VIEWPORT_RECT: &str = "viewport_rect";

/// Results keyed by query name, filled on first use and dropped only when
/// the session ends.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<String, Value>,
}

impl QueryCache {
    pub fn get(&self, query: &str) -> Option<&Value> {
        self.entries.get(query)
    }

    pub fn insert(&mut self, query: impl Into<String>, value: Value) {
        self.entries.insert(query.into(), value);
    }

    pub async fn get_or_fetch<F, Fut, E>(&mut self, query: &str, fetch: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.entries.get(query) {
            trace!("Query cache hit: {query}");
            return Ok(value.clone());
        }

        let value = fetch().await?;
        self.entries.insert(query.to_string(), value.clone());
        Ok(value)
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
