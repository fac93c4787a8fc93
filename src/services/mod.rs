//! HTTP collaborators the matching pipeline depends on.
//!
//! Each external service is a trait with one reqwest-backed implementation
//! and one mock for tests:
//! - `TerminologyService` — vocabulary crosswalk (source code → NCIt concept)
//! - `TrialRegistry` — paginated clinical-trials corpus search
//! - `EntityDetector` — medical entity detection over free text
//!
//! All clients carry a fixed per-request timeout so a hung request surfaces
//! as `ServiceError::Timeout` instead of stalling its whole fan-out batch.

pub mod detection;
pub mod registry;
pub mod terminology;

use thiserror::Error;

pub use detection::{DetectedEntity, EntityAttribute, EntityDetector, HttpEntityDetector};
pub use registry::{NciRegistryClient, TrialRegistry, TrialSearch, TrialsPage};
pub use terminology::{CrosswalkCandidate, TerminologyService, UmlsClient};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Cannot connect to {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Classify a reqwest failure into the variants callers degrade on.
pub(crate) fn classify_request_error(
    err: reqwest::Error,
    base_url: &str,
    timeout_secs: u64,
) -> ServiceError {
    if err.is_connect() {
        ServiceError::Connection(base_url.to_string())
    } else if err.is_timeout() {
        ServiceError::Timeout(timeout_secs)
    } else {
        ServiceError::HttpClient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_is_distinguishable() {
        let err = ServiceError::Timeout(30);
        assert!(matches!(err, ServiceError::Timeout(30)));
        assert_eq!(err.to_string(), "Request timed out after 30s");
    }

    #[test]
    fn http_error_carries_status_and_body() {
        let err = ServiceError::Http {
            status: 503,
            body: "unavailable".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("unavailable"));
    }
}
