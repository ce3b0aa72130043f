use dashmap::DashMap;
use serde_json::Value;

use crate::core::ports::cache::Cache;

/// In-process read-model cache shared across workers.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    fn invalidate(&self, keys: &[String]) {
        for key in keys {
            self.entries.remove(key);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_invalidate() {
        let cache = MemoryCache::new();
        cache.put("form:1".into(), json!({"id": 1}));
        assert_eq!(cache.get("form:1"), Some(json!({"id": 1})));
        // invalidating an absent key is a no-op
        cache.invalidate(&["form:1".into(), "form:2".into()]);
        assert_eq!(cache.get("form:1"), None);
    }
}
