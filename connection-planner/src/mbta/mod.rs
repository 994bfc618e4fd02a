//! MBTA v3 API client.
//!
//! This module provides an HTTP client for the MBTA's JSON:API service and
//! implements the planner's data source on top of it.
//!
//! Key characteristics of the API:
//! - Responses are JSON:API documents; related records are referenced by id
//!   through `relationships`
//! - Schedules are filtered by service date and a `HH:MM` time range, where
//!   hours past 23 address the tail of the previous service day
//! - Predictions exist only for trips already in or near service, and may
//!   carry only one of arrival and departure
//! - Large result sets are paged through `links.next`

mod client;
mod convert;
mod error;
mod types;

pub use client::{MbtaClient, MbtaConfig};
pub use convert::{
    ConversionError, StopEvent, convert_record, endpoints_from_events, pairs_from_events,
    stop_events, summarize_alerts,
};
pub use error::MbtaError;
pub use types::{
    AlertAttributes, InformedEntity, Linkage, Links, ListDocument, Relationship, Resource,
    ResourceId, SingleDocument, StopAttributes, StopTimeAttributes,
};
