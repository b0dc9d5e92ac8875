//! Application-level configuration loading, including the sync engine tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    services::coalescer::DebounceWindows,
    state::{
        messages::{MESSAGE_BUFFER_LIMIT, SCROLL_ANCHOR_THRESHOLD_PX},
        tracker::PresenceTuning,
    },
};

/// Default location on disk where the bridge looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/courtside.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_SYNC_CONFIG_PATH";
/// Environment variable that overrides the configured API base URL.
const API_URL_ENV: &str = "COURTSIDE_API_URL";
const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_EVENT_STREAM_PATH: &str = "/api/events";
const DEFAULT_COURT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
/// Periodic tasks never run more often than this.
const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
/// Timing and threshold knobs of the sync engine.
pub struct SyncTuning {
    pub presence: PresenceTuning,
    pub debounce: DebounceWindows,
    pub message_buffer_limit: usize,
    pub scroll_anchor_threshold_px: f64,
    pub court_refresh_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            presence: PresenceTuning::default(),
            debounce: DebounceWindows::default(),
            message_buffer_limit: MESSAGE_BUFFER_LIMIT,
            scroll_anchor_threshold_px: SCROLL_ANCHOR_THRESHOLD_PX,
            court_refresh_interval: DEFAULT_COURT_REFRESH_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub api_base_url: String,
    pub event_stream_path: String,
    pub sync: SyncTuning,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded sync configuration");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env::var(API_URL_ENV).ok().filter(|url| !url.trim().is_empty()) {
            info!(%url, "API base URL overridden from environment");
            self.api_base_url = url;
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            event_stream_path: DEFAULT_EVENT_STREAM_PATH.to_string(),
            sync: SyncTuning::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    api_base_url: Option<String>,
    event_stream_path: Option<String>,
    checkin_radius_m: Option<f64>,
    checkout_radius_m: Option<f64>,
    max_accuracy_m: Option<f64>,
    min_auto_action_interval_ms: Option<u64>,
    checkout_confirm_reads: Option<u32>,
    checkout_confirm_window_ms: Option<u64>,
    checkout_accuracy_buffer_max_m: Option<f64>,
    court_refresh_interval_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
    presence_debounce_ms: Option<u64>,
    ranked_debounce_ms: Option<u64>,
    notification_debounce_ms: Option<u64>,
    message_buffer_limit: Option<usize>,
    scroll_anchor_threshold_px: Option<f64>,
    nearby_court_radius_m: Option<f64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = SyncTuning::default();
        let mut presence = PresenceTuning {
            checkin_radius_m: meters_or(value.checkin_radius_m, defaults.presence.checkin_radius_m, "checkin_radius_m"),
            checkout_radius_m: meters_or(value.checkout_radius_m, defaults.presence.checkout_radius_m, "checkout_radius_m"),
            max_accuracy_m: meters_or(value.max_accuracy_m, defaults.presence.max_accuracy_m, "max_accuracy_m"),
            min_auto_action_interval: millis_or(
                value.min_auto_action_interval_ms,
                defaults.presence.min_auto_action_interval,
            ),
            checkout_confirm_reads: value
                .checkout_confirm_reads
                .unwrap_or(defaults.presence.checkout_confirm_reads)
                .max(1),
            checkout_confirm_window: millis_or(
                value.checkout_confirm_window_ms,
                defaults.presence.checkout_confirm_window,
            ),
            checkout_accuracy_buffer_max_m: meters_or(value.checkout_accuracy_buffer_max_m, defaults.presence.checkout_accuracy_buffer_max_m, "checkout_accuracy_buffer_max_m"),
            nearby_court_radius_m: meters_or(value.nearby_court_radius_m, defaults.presence.nearby_court_radius_m, "nearby_court_radius_m"),
        };

        if presence.checkin_radius_m <= 0.0 {
            warn!(
                value = presence.checkin_radius_m,
                "checkin_radius_m must be positive; using default"
            );
            presence.checkin_radius_m = defaults.presence.checkin_radius_m;
        }
        if presence.checkout_radius_m <= presence.checkin_radius_m {
            let widened = presence.checkin_radius_m * defaults.presence.checkout_radius_m
                / defaults.presence.checkin_radius_m;
            warn!(
                checkin_radius_m = presence.checkin_radius_m,
                checkout_radius_m = presence.checkout_radius_m,
                widened,
                "checkout radius must exceed checkin radius; widening it"
            );
            presence.checkout_radius_m = widened;
        }

        let debounce = DebounceWindows {
            presence: millis_or(value.presence_debounce_ms, defaults.debounce.presence),
            ranked: millis_or(value.ranked_debounce_ms, defaults.debounce.ranked),
            notification: millis_or(
                value.notification_debounce_ms,
                defaults.debounce.notification,
            ),
        };

        Self {
            api_base_url: value
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            event_stream_path: value
                .event_stream_path
                .unwrap_or_else(|| DEFAULT_EVENT_STREAM_PATH.to_string()),
            sync: SyncTuning {
                presence,
                debounce,
                message_buffer_limit: value
                    .message_buffer_limit
                    .unwrap_or(defaults.message_buffer_limit)
                    .max(1),
                scroll_anchor_threshold_px: meters_or(
                    value.scroll_anchor_threshold_px,
                    defaults.scroll_anchor_threshold_px,
                    "scroll_anchor_threshold_px",
                ),
                court_refresh_interval: millis_or(
                    value.court_refresh_interval_ms,
                    defaults.court_refresh_interval,
                )
                .max(MIN_PERIOD),
                heartbeat_interval: millis_or(
                    value.heartbeat_interval_ms,
                    defaults.heartbeat_interval,
                )
                .max(MIN_PERIOD),
            },
        }
    }
}

/// Distances and thresholds must be finite and non-negative.
fn meters_or(value: Option<f64>, default: f64, field: &'static str) -> f64 {
    match value {
        Some(value) if value.is_finite() && value >= 0.0 => value,
        Some(value) => {
            warn!(field, value, "invalid distance in config; using default");
            default
        }
        None => default,
    }
}

fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
