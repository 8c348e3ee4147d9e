//! Static timing configuration for the bridge.

use crate::interaction::RequestKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Application and process name of the target app.
    pub app_name: String,
    pub standard_timeout: Duration,
    pub search_timeout: Duration,
    /// Pause after activating the app, before touching its UI.
    pub initial_delay: Duration,
    pub new_chat_delay: Duration,
    /// Pause between paste and submit.
    pub typing_delay: Duration,
    /// Pause after clearing the input field.
    pub clear_delay: Duration,
    pub conversation_select_delay: Duration,
    /// Settle time after launching an app that was not running.
    pub launch_settle_delay: Duration,
    /// Extra wait before the first poll of a search-like request.
    pub search_grace_delay: Duration,
    pub check_interval: Duration,
    pub stable_checks: u32,
    /// A search still processing after this long gets an extra progress log line.
    pub search_progress_notice_after: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_name: "ChatGPT".to_string(),
            standard_timeout: Duration::from_secs(120),
            search_timeout: Duration::from_secs(600),
            initial_delay: Duration::from_millis(1000),
            new_chat_delay: Duration::from_millis(1000),
            typing_delay: Duration::from_millis(500),
            clear_delay: Duration::from_millis(500),
            conversation_select_delay: Duration::from_millis(1000),
            launch_settle_delay: Duration::from_secs(2),
            search_grace_delay: Duration::from_secs(3),
            check_interval: Duration::from_millis(1000),
            stable_checks: 3,
            search_progress_notice_after: Duration::from_secs(30),
        }
    }
}

impl BridgeConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; durations are milliseconds.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| -> Duration {
            match lookup(key) {
                Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<u64>() {
                    Ok(ms) => Duration::from_millis(ms),
                    Err(_) => {
                        warn!("Ignoring invalid {key}={raw:?}, using {}ms", default.as_millis());
                        default
                    }
                },
                _ => default,
            }
        };

        let stable_checks = match lookup("STABLE_CHECKS") {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<u32>().unwrap_or_else(|_| {
                warn!("Ignoring invalid STABLE_CHECKS={raw:?}");
                defaults.stable_checks
            }),
            _ => defaults.stable_checks,
        };

        Self {
            app_name: lookup("CHATGPT_APP_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| defaults.app_name.clone()),
            standard_timeout: millis("STANDARD_TIMEOUT", defaults.standard_timeout),
            search_timeout: millis("SEARCH_TIMEOUT", defaults.search_timeout),
            initial_delay: millis("INITIAL_DELAY", defaults.initial_delay),
            new_chat_delay: millis("NEW_CHAT_DELAY", defaults.new_chat_delay),
            typing_delay: millis("TYPING_DELAY", defaults.typing_delay),
            check_interval: millis("CHECK_INTERVAL", defaults.check_interval),
            stable_checks,
            ..defaults
        }
    }

    pub fn timeout_for(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Standard => self.standard_timeout,
            RequestKind::Search => self.search_timeout,
        }
    }
}
