use serde::{Deserialize, Serialize};

fn default_history_limit() -> usize {
    100
}

fn default_view_history_limit() -> usize {
    10
}

fn default_session_max_age_minutes() -> i64 {
    60
}

fn default_cleanup_interval_secs() -> i64 {
    300
}

fn default_view_timeout_secs() -> u64 {
    180
}

/// Tunable limits for the coordination layer.
///
/// All fields have defaults, so a config file only needs to name the values
/// it overrides.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WeftConfig {
    /// Maximum number of actions retained in the dispatch history ring.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Maximum number of navigation entries retained per session.
    #[serde(default = "default_view_history_limit")]
    pub view_history_limit: usize,
    /// Idle threshold after which a session is eligible for eviction.
    #[serde(default = "default_session_max_age_minutes")]
    pub session_max_age_minutes: i64,
    /// Minimum interval between two cleanup sweeps.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: i64,
    /// Platform-driven inactivity timeout applied to new views.
    #[serde(default = "default_view_timeout_secs")]
    pub view_timeout_secs: u64,
    /// Whether outbound responses are ephemeral unless a view overrides it.
    #[serde(default)]
    pub ephemeral_default: bool,
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            view_history_limit: default_view_history_limit(),
            session_max_age_minutes: default_session_max_age_minutes(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            view_timeout_secs: default_view_timeout_secs(),
            ephemeral_default: false,
        }
    }
}
