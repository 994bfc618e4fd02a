//! MBTA v3 API response DTOs.
//!
//! The API speaks JSON:API: every record is a resource with an `id`, a `type`,
//! an `attributes` object and `relationships` pointing at other resources by
//! id. Fields are optional throughout because the API sends `null` for
//! anything it does not know.

use std::collections::BTreeMap;

use serde::Deserialize;

/// A paged list response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListDocument<A> {
    pub data: Vec<Resource<A>>,

    #[serde(default)]
    pub links: Links,
}

/// A single-resource response, with any side-loaded resources.
#[derive(Debug, Clone, Deserialize)]
pub struct SingleDocument<A> {
    pub data: Resource<A>,

    #[serde(default)]
    pub included: Vec<Resource<StopAttributes>>,
}

/// Pagination links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    /// Absolute URL of the next page, absent on the last one.
    pub next: Option<String>,
}

/// One JSON:API resource.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub attributes: A,

    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
}

impl<A> Resource<A> {
    /// The single id a to-one relationship points at.
    pub fn related_id(&self, name: &str) -> Option<&str> {
        match self.relationships.get(name)?.data.as_ref()? {
            Linkage::One(target) => Some(target.id.as_str()),
            Linkage::Many(_) => None,
        }
    }

    /// All ids a to-many relationship points at.
    pub fn related_ids(&self, name: &str) -> Vec<&str> {
        match self.relationships.get(name).and_then(|r| r.data.as_ref()) {
            Some(Linkage::Many(targets)) => targets.iter().map(|t| t.id.as_str()).collect(),
            Some(Linkage::One(target)) => vec![target.id.as_str()],
            None => Vec::new(),
        }
    }
}

/// A relationship's `data` member.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Linkage>,
}

/// To-one or to-many resource linkage.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    One(ResourceId),
    Many(Vec<ResourceId>),
}

/// Identifies a related resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceId {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,
}

/// Attributes shared by `schedule` and `prediction` resources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopTimeAttributes {
    /// ISO 8601 arrival time; `null` at the first stop of a trip.
    pub arrival_time: Option<String>,

    /// ISO 8601 departure time; `null` at the last stop of a trip.
    pub departure_time: Option<String>,

    pub stop_sequence: Option<u32>,

    /// Prediction-only: `ADDED`, `CANCELLED`, `NO_DATA`, `SKIPPED`,
    /// `UNSCHEDULED` or `null`.
    pub schedule_relationship: Option<String>,
}

/// Attributes of a `stop` resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopAttributes {
    pub name: Option<String>,
    pub location_type: Option<u8>,
}

/// Attributes of an `alert` resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertAttributes {
    pub header: Option<String>,
    pub effect: Option<String>,
    pub lifecycle: Option<String>,

    #[serde(default)]
    pub informed_entity: Vec<InformedEntity>,
}

/// What an alert applies to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InformedEntity {
    pub route: Option<String>,
    pub stop: Option<String>,
    pub trip: Option<String>,
    pub route_type: Option<u8>,
}
