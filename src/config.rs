/// Library-level constants
pub const LIB_NAME: &str = "trialmatch";
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// NCI clinical-trials corpus endpoint
pub const DEFAULT_TRIALS_URL: &str = "https://clinicaltrialsapi.cancer.gov/v1/clinical-trials";

/// UMLS crosswalk endpoint (codeset/code appended per request)
pub const DEFAULT_UMLS_CROSSWALK_URL: &str =
    "https://uts-ws.nlm.nih.gov/rest/crosswalk/current/source";

/// UMLS ticket-granting endpoint
pub const DEFAULT_UMLS_AUTH_URL: &str = "https://utslogin.nlm.nih.gov/cas/v1/api-key";

/// Trials-corpus page size
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Per-request timeout applied to every service client, so a hung request
/// fails its own task instead of stalling a whole fan-out batch.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> String {
    format!("{LIB_NAME}=info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_matches_registry_default() {
        assert_eq!(DEFAULT_PAGE_SIZE, 50);
    }

    #[test]
    fn log_filter_scopes_to_crate() {
        assert_eq!(default_log_filter(), "trialmatch=info");
    }

    #[test]
    fn lib_version_matches_cargo() {
        assert_eq!(LIB_VERSION, "0.1.0");
    }
}
