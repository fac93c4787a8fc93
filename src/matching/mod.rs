//! Trial-matching pipeline.
//!
//! Five parts connected by the service traits in `crate::services`:
//! ```text
//! crosswalk → corpus → orchestrator ─┬─ extractor
//!                                    └─ expression
//! ```
//! `runner::run_match` composes the whole chain for one patient. All three
//! fan-out points (code resolution, page fetch, chunk filtering) spawn into
//! a `JoinSet` and join results by a key carried in each task's return
//! value; chunk filtering drains to completion before merging, the other
//! two consume results as they complete.

pub mod corpus;
pub mod crosswalk;
pub mod expression;
pub mod extractor;
pub mod orchestrator;
pub mod runner;

pub use corpus::TrialCorpusFetcher;
pub use crosswalk::CodeCrosswalkResolver;
pub use extractor::EligibilityExtractor;
pub use orchestrator::{group_by_code, FilterOrchestrator, MAX_TRIALS_PER_CHUNK};
pub use runner::{run_match, PatientProfile};
