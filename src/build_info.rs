use std::sync::LazyLock;

// ============================================================================
// Constants
// ============================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = match option_env!("BUILD_COMMIT") {
    Some(c) => c,
    None => "unknown",
};
pub const BUILD_DATE: &str = match option_env!("BUILD_DATE") {
    Some(d) => d,
    None => "unknown",
};

/// Full version string including commit and build date.
pub fn version_string() -> String {
    format!("{} (commit: {}, built: {})", VERSION, COMMIT, BUILD_DATE)
}

static LONG_VERSION: LazyLock<String> = LazyLock::new(version_string);

/// [`version_string`] with a static lifetime, shown by `--version`.
pub fn long_version() -> &'static str {
    LONG_VERSION.as_str()
}

/// User agent sent to the backup API.
pub fn user_agent() -> String {
    format!("opengine/{}", VERSION)
}
