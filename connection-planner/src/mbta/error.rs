//! MBTA client error types.

use std::fmt;

use crate::planner::DataSourceError;

/// Errors from the MBTA HTTP client.
#[derive(Debug)]
pub enum MbtaError {
    /// HTTP request failed (network error, timeout, etc.)
    Http(reqwest::Error),

    /// JSON deserialization failed
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an error status code
    ApiError { status: u16, message: String },

    /// Requested resource does not exist
    NotFound(String),

    /// Rate limited by the API
    RateLimited,

    /// Invalid API key or forbidden
    Unauthorized,
}

impl MbtaError {
    /// Map to the planner's error type, naming what was being fetched.
    pub fn into_source_error(self, resource: &str) -> DataSourceError {
        match self {
            MbtaError::RateLimited => DataSourceError::RateLimited {
                resource: resource.to_string(),
            },
            MbtaError::NotFound(what) => DataSourceError::NotFound(what),
            other => DataSourceError::Fetch {
                resource: resource.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for MbtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MbtaError::Http(e) => write!(f, "HTTP error: {e}"),
            MbtaError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
            MbtaError::ApiError { status, message } => {
                write!(f, "API error {status}: {message}")
            }
            MbtaError::NotFound(what) => write!(f, "not found: {what}"),
            MbtaError::RateLimited => write!(f, "rate limited by MBTA API"),
            MbtaError::Unauthorized => write!(f, "unauthorized (invalid API key)"),
        }
    }
}

impl std::error::Error for MbtaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MbtaError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MbtaError {
    fn from(err: reqwest::Error) -> Self {
        MbtaError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MbtaError::NotFound("stop place-xyz".into());
        assert_eq!(err.to_string(), "not found: stop place-xyz");

        let err = MbtaError::ApiError {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");

        let err = MbtaError::Json {
            message: "expected string".into(),
            body: Some("{}".into()),
        };
        assert!(err.to_string().contains("JSON parse error"));
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn maps_to_source_error() {
        assert_eq!(
            MbtaError::RateLimited.into_source_error("predictions"),
            DataSourceError::RateLimited {
                resource: "predictions".into()
            }
        );
        assert_eq!(
            MbtaError::NotFound("stop x".into()).into_source_error("stops"),
            DataSourceError::NotFound("stop x".into())
        );
        assert_eq!(
            MbtaError::Unauthorized.into_source_error("alerts"),
            DataSourceError::Fetch {
                resource: "alerts".into(),
                message: "unauthorized (invalid API key)".into()
            }
        );
    }
}
