//! Cache configuration.
//!
//! Per-family base TTLs and the scales applied by each view.

use std::num::NonZeroU32;

use super::keys::ResourceFamily;

pub(crate) const DEFAULT_EVENTS_TTL: u32 = 300;
pub(crate) const DEFAULT_LEADERBOARD_TTL: u32 = 180;
pub(crate) const DEFAULT_ATHLETES_TTL: u32 = 600;
pub(crate) const DEFAULT_VENUES_TTL: u32 = 900;
pub(crate) const DEFAULT_COMMUNITY_TTL: u32 = 120;
pub(crate) const DEFAULT_ADMIN_TTL: u32 = 60;
pub(crate) const DEFAULT_TTL: u32 = 300;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Multiplier applied to a family's base TTL for a specific view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlScale {
    /// Lists and ordinary views.
    Base,
    /// Single-record views; they change less often than lists.
    Detail,
    /// Expensive aggregates (featured, achievements) that tolerate staleness.
    Extended,
    /// Trending and personalized views that must feel fresh.
    Fresh,
}

impl TtlScale {
    fn apply(self, base: u32) -> u32 {
        let scaled = match self {
            TtlScale::Base => base,
            TtlScale::Detail => base.saturating_mul(2),
            TtlScale::Extended => base.saturating_mul(3),
            TtlScale::Fresh => base / 2,
        };
        scaled.max(1)
    }
}

/// Base TTL per resource family, in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    pub events: NonZeroU32,
    pub leaderboard: NonZeroU32,
    pub athletes: NonZeroU32,
    pub venues: NonZeroU32,
    pub community: NonZeroU32,
    pub admin: NonZeroU32,
    pub default: NonZeroU32,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            events: non_zero(DEFAULT_EVENTS_TTL),
            leaderboard: non_zero(DEFAULT_LEADERBOARD_TTL),
            athletes: non_zero(DEFAULT_ATHLETES_TTL),
            venues: non_zero(DEFAULT_VENUES_TTL),
            community: non_zero(DEFAULT_COMMUNITY_TTL),
            admin: non_zero(DEFAULT_ADMIN_TTL),
            default: non_zero(DEFAULT_TTL),
        }
    }
}

impl TtlPolicy {
    /// Base TTL for a family.
    pub fn ttl(&self, family: ResourceFamily) -> u32 {
        let value = match family {
            ResourceFamily::Events => self.events,
            ResourceFamily::Leaderboard => self.leaderboard,
            ResourceFamily::Athletes => self.athletes,
            ResourceFamily::Venues => self.venues,
            ResourceFamily::Community => self.community,
            ResourceFamily::Admin => self.admin,
        };
        value.get()
    }

    /// Base TTL for a family given by name; unknown names use the default TTL.
    pub fn ttl_for_name(&self, family: &str) -> u32 {
        ResourceFamily::parse(family)
            .map(|family| self.ttl(family))
            .unwrap_or(self.default.get())
    }

    pub fn scaled(&self, family: ResourceFamily, scale: TtlScale) -> u32 {
        scale.apply(self.ttl(family))
    }

    pub fn default_ttl(&self) -> u32 {
        self.default.get()
    }
}

/// Response cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: TtlPolicy,
    /// Coalesce concurrent misses for the same key.
    pub single_flight: bool,
    /// Add the resolved `cacheKey` to cache hits (never in production).
    pub expose_keys: bool,
    /// Responses larger than this are served but not cached.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: TtlPolicy::default(),
            single_flight: true,
            expose_keys: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            ttl: settings.cache.ttl.clone(),
            single_flight: settings.cache.single_flight,
            expose_keys: !settings.environment.is_production(),
            max_body_bytes: settings.cache.max_body_bytes.get(),
        }
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl(ResourceFamily::Events), 300);
        assert_eq!(policy.ttl(ResourceFamily::Leaderboard), 180);
        assert_eq!(policy.ttl(ResourceFamily::Athletes), 600);
        assert_eq!(policy.ttl(ResourceFamily::Venues), 900);
        assert_eq!(policy.ttl(ResourceFamily::Community), 120);
        assert_eq!(policy.ttl(ResourceFamily::Admin), 60);
        assert_eq!(policy.default_ttl(), 300);
    }

    #[test]
    fn unknown_family_falls_back_to_default() {
        let policy = TtlPolicy {
            default: non_zero(42),
            ..Default::default()
        };
        assert_eq!(policy.ttl_for_name("notifications"), 42);
        assert_eq!(policy.ttl_for_name("venues"), 900);
    }

    #[test]
    fn scales_apply_to_base() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.scaled(ResourceFamily::Events, TtlScale::Base), 300);
        assert_eq!(policy.scaled(ResourceFamily::Events, TtlScale::Detail), 600);
        assert_eq!(policy.scaled(ResourceFamily::Events, TtlScale::Extended), 900);
        assert_eq!(policy.scaled(ResourceFamily::Events, TtlScale::Fresh), 150);
    }

    #[test]
    fn fresh_scale_never_reaches_zero() {
        let policy = TtlPolicy {
            community: non_zero(1),
            ..Default::default()
        };
        assert_eq!(policy.scaled(ResourceFamily::Community, TtlScale::Fresh), 1);
    }
}
