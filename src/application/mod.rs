//! Application services layer.

pub mod error;
pub mod events;
pub mod pagination;
pub mod repos;
pub mod venues;
