//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the domain layer. They are distinct from API/IO errors.

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Leg pair endpoints are out of order
    #[error("invalid leg pair: {0}")]
    InvalidPair(&'static str),

    /// Stop sequences show the trip visits the destination first
    #[error("wrong direction: origin sequence {from} is not before destination sequence {to}")]
    WrongDirection { from: u32, to: u32 },

    /// Time window is empty or inverted
    #[error("invalid time window: {0}")]
    InvalidWindow(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::InvalidPair("origin must be strictly before destination");
        assert_eq!(
            err.to_string(),
            "invalid leg pair: origin must be strictly before destination"
        );

        let err = DomainError::WrongDirection { from: 9, to: 3 };
        assert_eq!(
            err.to_string(),
            "wrong direction: origin sequence 9 is not before destination sequence 3"
        );

        let err = DomainError::InvalidWindow("horizon must be positive");
        assert_eq!(err.to_string(), "invalid time window: horizon must be positive");
    }
}
