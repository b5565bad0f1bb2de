//! State module for tracking URI progress through the frontier
//!
//! # Components
//!
//! - `StoreState`: Where a URI or per-host queue currently lives
//! - `FetchStatus`: Outcome code reported by a worker for a fetch attempt
//! - `now_millis`: The wall clock used for wake times and politeness

mod fetch_status;
mod store_state;

pub use fetch_status::FetchStatus;
pub use store_state::StoreState;

use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
