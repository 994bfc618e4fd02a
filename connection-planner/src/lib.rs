//! Three-leg connection planner.
//!
//! Answers "which bus will I make?" for a fixed commute: a feeder leg into a
//! transfer station, an upstream rail leg, then a bus, optionally ridden on to
//! a home stop. Timetables and live predictions come from the MBTA v3 API.

pub mod cache;
pub mod config;
pub mod domain;
pub mod mbta;
pub mod planner;
pub mod web;
