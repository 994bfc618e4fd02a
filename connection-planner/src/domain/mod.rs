//! Domain types for the connection planner.
//!
//! This module contains the core domain model types that represent
//! validated transit data. All types enforce their invariants at construction
//! time, so code that receives these types can trust their validity.

mod error;
mod ids;
mod leg;
mod stop;
mod time;

pub use error::DomainError;
pub use ids::{RouteId, StopId, TripId, join_ids};
pub use leg::{Endpoint, LegPair};
pub use stop::StopGroup;
pub use time::{TimeError, TimeOfDay, TransitTime, parse_override};
