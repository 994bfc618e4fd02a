//! Identifier newtypes.
//!
//! Trip, stop and route identifiers are opaque strings assigned by the
//! agency. Wrapping them keeps a trip id from being passed where a stop id is
//! expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// A trip identifier, unique within a service date.
    TripId
);

string_id!(
    /// A stop identifier: a parent station or one of its platforms.
    StopId
);

string_id!(
    /// A route identifier such as `Red` or `Green-E`.
    RouteId
);

/// Join identifiers with commas, as the data source expects in filters.
pub fn join_ids<'a, T: fmt::Display + 'a>(ids: impl IntoIterator<Item = &'a T>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_debug() {
        let trip = TripId::new("60392455");
        assert_eq!(trip.to_string(), "60392455");
        assert_eq!(format!("{trip:?}"), "TripId(60392455)");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut ids = vec![StopId::from("70063"), StopId::from("70061"), StopId::from("place-pktrm")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "70061");
        assert_eq!(ids[2].as_str(), "place-pktrm");
    }

    #[test]
    fn join_for_filters() {
        let routes = [RouteId::from("Green-D"), RouteId::from("Green-E")];
        assert_eq!(join_ids(&routes), "Green-D,Green-E");
        assert_eq!(join_ids::<RouteId>(&[]), "");
    }

    #[test]
    fn serializes_as_plain_string() {
        let route = RouteId::from("Red");
        assert_eq!(serde_json::to_string(&route).unwrap(), "\"Red\"");
    }
}
