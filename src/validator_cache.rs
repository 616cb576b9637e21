//! # Schema Validator Cache
//!
//! Compiling a JSON Schema is far more expensive than running it. Every
//! parameter and response schema of the merged specification is compiled at
//! most once per process and the compiled validator is shared by all requests
//! through an `Arc`.
//!
//! ## Cache Key Structure
//!
//! Keys are the first 16 hex characters of the SHA-256 of the schema's JSON
//! text. Identical inline schemas that appear on several routes therefore
//! share one compiled validator.
//!
//! ## Thread Safety
//!
//! The map sits behind `Arc<RwLock<..>>`: lookups take the read lock, a miss
//! compiles outside any lock and then takes the write lock to insert
//! (double-checked, so concurrent misses keep the first winner).
//!
//! ## Configuration
//!
//! Caching can be disabled with `SWAGGERWARE_SCHEMA_CACHE=off` (or
//! `validation.schema_cache: false`), in which case every call compiles.

use jsonschema::Validator;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Thread-safe cache for compiled JSON Schema validators
///
/// # Example
///
/// ```rust
/// use swaggerware::validator_cache::ValidatorCache;
/// use serde_json::json;
///
/// let cache = ValidatorCache::new(true);
/// let schema = json!({"type": "string"});
/// let compiled = cache.get_or_compile(&schema, || {
///     jsonschema::options().build(&schema).map_err(|e| e.to_string())
/// });
/// assert!(compiled.is_ok());
/// assert_eq!(cache.size(), 1);
/// ```
#[derive(Clone)]
pub struct ValidatorCache {
    cache: Arc<RwLock<HashMap<String, Arc<Validator>>>>,
    enabled: bool,
}

impl Default for ValidatorCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ValidatorCache {
    /// Create a new validator cache
    ///
    /// # Arguments
    ///
    /// * `enabled` - Whether compiled validators are kept between calls
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        info!(enabled = enabled, "Initializing JSON Schema validator cache");
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            enabled,
        }
    }

    /// Whether caching is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stable fingerprint of a schema, used as cache key.
    #[must_use]
    pub fn fingerprint(schema: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(schema.to_string().as_bytes());
        let digest = hasher.finalize();
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }

    /// Get a cached validator or run `compile` and cache its result
    ///
    /// Compilation errors are returned unchanged and never cached, so a schema
    /// that fails to compile fails again on every call.
    ///
    /// # Arguments
    ///
    /// * `schema` - The schema the validator is compiled from (key material)
    /// * `compile` - Produces the validator on a cache miss
    pub fn get_or_compile<E, F>(&self, schema: &Value, compile: F) -> Result<Arc<Validator>, E>
    where
        F: FnOnce() -> Result<Validator, E>,
    {
        if !self.enabled {
            return compile().map(Arc::new);
        }

        let key = Self::fingerprint(schema);

        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(validator) = cache.get(&key) {
                debug!(cache_key = %key, "Schema validator cache hit");
                return Ok(Arc::clone(validator));
            }
        }

        let validator = Arc::new(compile()?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = cache.get(&key) {
            debug!(cache_key = %key, "Schema validator compiled by another thread");
            return Ok(Arc::clone(existing));
        }
        cache.insert(key.clone(), Arc::clone(&validator));
        debug!(
            cache_key = %key,
            cache_size = cache.len(),
            "Schema validator compiled and cached"
        );
        Ok(validator)
    }

    /// Number of validators currently cached
    #[must_use]
    pub fn size(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop every cached validator.
    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = cache.len();
        cache.clear();
        info!(dropped = dropped, "Schema validator cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(schema: &Value) -> Result<Validator, String> {
        jsonschema::options().build(schema).map_err(|e| e.to_string())
    }

    #[test]
    fn test_cache_hit_reuses_validator() {
        let cache = ValidatorCache::new(true);
        let schema = json!({"type": "object"});
        let first = cache.get_or_compile(&schema, || compile(&schema)).unwrap();
        let second = cache
            .get_or_compile(&schema, || -> Result<Validator, String> {
                panic!("must not recompile")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_disabled_cache_keeps_nothing() {
        let cache = ValidatorCache::new(false);
        let schema = json!({"type": "integer"});
        cache.get_or_compile(&schema, || compile(&schema)).unwrap();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = ValidatorCache::new(true);
        let schema = json!({"type": "string"});
        let result: Result<Arc<Validator>, String> =
            cache.get_or_compile(&schema, || Err("boom".to_string()));
        assert_eq!(result.err().as_deref(), Some("boom"));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_clear() {
        let cache = ValidatorCache::new(true);
        let schema = json!({"type": "string"});
        cache.get_or_compile(&schema, || compile(&schema)).unwrap();
        cache.clear();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = json!({"type": "string", "format": "date"});
        assert_eq!(ValidatorCache::fingerprint(&a), ValidatorCache::fingerprint(&a.clone()));
        assert_ne!(
            ValidatorCache::fingerprint(&a),
            ValidatorCache::fingerprint(&json!({"type": "string"}))
        );
        assert_eq!(ValidatorCache::fingerprint(&a).len(), 16);
    }
}
