//! HTTP API handlers for orgmatch
//!
//! JSON in, JSON out. Resolution itself never fails at the HTTP layer: every
//! query yields an outcome, and only malformed requests are rejected.

pub mod cache;
pub mod health;
pub mod resolve;

pub use cache::cache_routes;
pub use health::health_routes;
pub use resolve::resolve_routes;
