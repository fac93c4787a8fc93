//! Trialmatch — clinical-trial eligibility matching core.
//!
//! Matches a cancer patient's profile (diagnosis codes, demographics, lab
//! values) against the NCI clinical-trials corpus and partitions the trials
//! into those whose extracted numeric thresholds the patient satisfies and
//! those excluded. Authentication, FHIR typing and persistence live outside
//! this crate; callers hand in already-parsed codes and lab values.

pub mod config;
pub mod matching;
pub mod models;
pub mod services;

use tracing_subscriber::EnvFilter;

pub use matching::{run_match, PatientProfile};
pub use models::{MatchOutcome, SourceCoding};
pub use services::ServiceError;

/// Initialize tracing for binaries embedding this crate. Honors RUST_LOG,
/// falling back to the crate-scoped default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
