//! Cache key definitions.
//!
//! Every key and every invalidation pattern is produced by [`KeyBuilder`], so the
//! patterns swept after a write always agree with the keys written on a read.
//!
//! Layout: `family:operation[:id][:page:N][:q:<term>][:name:value...]`. An
//! operation with no parameters ends in the segment `all`, which keeps every key
//! strictly below `family:operation:` and therefore inside
//! [`KeyPattern::operation`].

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded::byte_serialize;

const SEPARATOR: char = ':';
const EMPTY_SEGMENT: &str = "all";

/// A named group of cached views sharing a TTL and a key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFamily {
    Events,
    Venues,
    Athletes,
    Community,
    Leaderboard,
    Admin,
}

impl ResourceFamily {
    pub const ALL: [ResourceFamily; 6] = [
        ResourceFamily::Events,
        ResourceFamily::Venues,
        ResourceFamily::Athletes,
        ResourceFamily::Community,
        ResourceFamily::Leaderboard,
        ResourceFamily::Admin,
    ];

    /// Namespace segment used as the first key component.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceFamily::Events => "events",
            ResourceFamily::Venues => "venues",
            ResourceFamily::Athletes => "athletes",
            ResourceFamily::Community => "community",
            ResourceFamily::Leaderboard => "leaderboard",
            ResourceFamily::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|family| family.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A prefix glob (`prefix:*`) accepted by the store's pattern delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern(String);

impl KeyPattern {
    /// Every key of a family: `family:*`.
    pub fn family(family: ResourceFamily) -> Self {
        Self(format!("{}{SEPARATOR}*", family.as_str()))
    }

    /// Every key of one operation: `family:operation:*`.
    pub fn operation(family: ResourceFamily, operation: &str) -> Self {
        KeyBuilder::new(family, operation).pattern()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyPattern {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Filter parameters of a list view, rendered in key order.
///
/// Backed by a `BTreeMap`, so two filter sets with the same entries render the
/// same way no matter how they were assembled. Empty values are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, String>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name.trim().is_empty() || value.trim().is_empty() {
            return;
        }
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Filters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (name, value) in iter {
            filters.insert(name, value);
        }
        filters
    }
}

/// Parameters accepted by [`build_key`].
#[derive(Debug, Clone, Default)]
pub struct KeyParams {
    pub id: Option<String>,
    pub page: Option<u32>,
    pub search: Option<String>,
    pub filters: Filters,
}

/// Build a key from a family, an operation, and its parameters.
pub fn build_key(family: ResourceFamily, operation: &str, params: &KeyParams) -> CacheKey {
    let mut builder = KeyBuilder::new(family, operation);
    if let Some(id) = params.id.as_deref() {
        builder = builder.id(id);
    }
    if let Some(page) = params.page {
        builder = builder.page(page);
    }
    if let Some(term) = params.search.as_deref() {
        builder = builder.search(term);
    }
    builder.filters(&params.filters).finish()
}

/// Incremental key construction.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
    segments: Vec<String>,
}

impl KeyBuilder {
    pub fn new(family: ResourceFamily, operation: &str) -> Self {
        Self {
            prefix: format!("{}{SEPARATOR}{}", family.as_str(), encode_segment(operation)),
            segments: Vec::new(),
        }
    }

    /// Identifier of a single record (or owner) the view is scoped to.
    pub fn id(mut self, id: impl fmt::Display) -> Self {
        self.segments.push(encode_segment(&id.to_string()));
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.segments.push("page".to_string());
        self.segments.push(page.to_string());
        self
    }

    /// Free-text search term, percent-encoded.
    pub fn search(mut self, term: &str) -> Self {
        self.segments.push("q".to_string());
        self.segments.push(encode_segment(term.trim()));
        self
    }

    /// Arbitrary `name:value` pair.
    pub fn segment(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.segments.push(encode_segment(name));
        self.segments.push(encode_segment(&value.to_string()));
        self
    }

    pub fn filters(mut self, filters: &Filters) -> Self {
        for (name, value) in filters.iter() {
            self.segments.push(encode_segment(name));
            self.segments.push(encode_segment(value));
        }
        self
    }

    pub fn finish(self) -> CacheKey {
        let mut key = self.prefix;
        if self.segments.is_empty() {
            key.push(SEPARATOR);
            key.push_str(EMPTY_SEGMENT);
        }
        for segment in self.segments {
            key.push(SEPARATOR);
            key.push_str(&segment);
        }
        CacheKey(key)
    }

    /// Glob matching every key that starts with the segments added so far.
    pub fn pattern(self) -> KeyPattern {
        let mut pattern = self.prefix;
        for segment in self.segments {
            pattern.push(SEPARATOR);
            pattern.push_str(&segment);
        }
        pattern.push(SEPARATOR);
        pattern.push('*');
        KeyPattern(pattern)
    }
}

/// Percent-encode a key segment.
///
/// Form encoding leaves `*` untouched; it is escaped as well so a key can never
/// be mistaken for a glob.
fn encode_segment(raw: &str) -> String {
    let encoded: String = byte_serialize(raw.as_bytes()).collect();
    encoded.replace('*', "%2A")
}
