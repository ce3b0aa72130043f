use serde_json::Value;

/// Read-model cache collaborator. Purely a performance hint: every read
/// path must fall back to the store on a miss, and no correctness rule
/// may depend on invalidation being prompt.
pub trait Cache {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: String, value: Value);
    fn invalidate(&self, keys: &[String]);
}
