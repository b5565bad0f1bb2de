//! Robots.txt handling module
//!
//! Parsing and caching of per-host robots.txt policies. The frontier consults
//! them before emitting a URI and when computing politeness delays.

mod cache;
mod policy;

pub use cache::CachedRobots;
pub use policy::RobotsPolicy;
