//! SportsBuddy API: a read-through response cache over a Redis-compatible
//! store, per-resource invalidation, and store-backed rate limiting.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
