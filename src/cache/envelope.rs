//! Handler/middleware contract for cacheable JSON responses.
//!
//! Typed handlers attach a [`CacheEligibility`] extension to their response, so
//! the middleware never needs to look inside the body to decide. Untyped JSON
//! responses fall back to the `success` field convention.

use serde_json::Value;

use super::keys::CacheKey;

/// Reserved: set on responses served from the cache.
pub const FROM_CACHE_FIELD: &str = "fromCache";
/// Reserved: the resolved key, added to cache hits outside production.
pub const CACHE_KEY_FIELD: &str = "cacheKey";

/// Response extension declaring whether a 200 response may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEligibility {
    Cacheable,
    Skip,
}

/// Duck-typed fallback: everything except an explicit `"success": false`.
pub fn body_allows_caching(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool) != Some(false)
}

/// Remove cache-only annotations before a payload is stored.
pub fn strip_annotations(body: &mut Value) {
    if let Value::Object(map) = body {
        map.remove(FROM_CACHE_FIELD);
        map.remove(CACHE_KEY_FIELD);
    }
}

/// Mark a stored payload as served from cache. Non-object payloads are
/// returned unchanged.
pub fn annotate_hit(mut body: Value, key: Option<&CacheKey>) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert(FROM_CACHE_FIELD.to_string(), Value::Bool(true));
        if let Some(key) = key {
            map.insert(
                CACHE_KEY_FIELD.to_string(),
                Value::String(key.as_str().to_string()),
            );
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_explicit_false_blocks_caching() {
        assert!(body_allows_caching(&json!({"success": true})));
        assert!(body_allows_caching(&json!({"data": []})));
        assert!(body_allows_caching(&json!({"success": "false"})));
        assert!(body_allows_caching(&json!([1, 2])));
        assert!(!body_allows_caching(&json!({"success": false, "message": "nope"})));
    }

    #[test]
    fn annotations_round_trip() {
        let original = json!({"success": true, "data": 1});
        let key = crate::cache::KeyBuilder::new(crate::cache::ResourceFamily::Events, "detail")
            .id(1)
            .finish();
        let mut annotated = annotate_hit(original.clone(), Some(&key));
        assert_eq!(annotated[FROM_CACHE_FIELD], true);
        assert_eq!(annotated[CACHE_KEY_FIELD], "events:detail:1");
        strip_annotations(&mut annotated);
        assert_eq!(annotated, original);
    }

    #[test]
    fn arrays_are_not_annotated() {
        let body = json!([1, 2, 3]);
        assert_eq!(annotate_hit(body.clone(), None), body);
    }
}
