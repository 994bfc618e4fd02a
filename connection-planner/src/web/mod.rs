//! Web layer for the connection planner.
//!
//! Serves the live plan as JSON. A background task keeps a snapshot of the
//! latest plan; requests with an `at` time are planned on demand instead.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, PlanSnapshot, live_now};
