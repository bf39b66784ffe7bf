/// Environment variable names used by this crate for convenient
/// configuration of handlers from services.
///
/// These are purely helpers; the core handler types remain decoupled
/// from environment access.

/// Cloud project identifier. Managed runtimes set this to the active
/// project, so honoring it makes name and trace correlation work
/// without explicit configuration.
pub const PROJECT_ID_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Minimum level, e.g. `debug`, `info`, `warn+2`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Set to `true` or `1` to emit call-site source locations.
pub const LOG_SOURCE_ENV: &str = "LOG_SOURCE";

/// Set to `true` or `1` to pretty-indent the JSON output.
pub const LOG_PRETTY_ENV: &str = "LOG_PRETTY";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag from the environment.
pub fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_the_default() {
        assert_eq!(env_or("GCLOUD_LOG_SINK_UNSET_VAR", "fallback"), "fallback");
    }

    #[test]
    fn env_flag_parses_common_spellings() {
        std::env::set_var("GCLOUD_LOG_SINK_FLAG_VAR", "TRUE");
        assert!(env_flag("GCLOUD_LOG_SINK_FLAG_VAR"));

        std::env::set_var("GCLOUD_LOG_SINK_FLAG_VAR", "0");
        assert!(!env_flag("GCLOUD_LOG_SINK_FLAG_VAR"));

        assert!(!env_flag("GCLOUD_LOG_SINK_UNSET_VAR"));
    }
}
