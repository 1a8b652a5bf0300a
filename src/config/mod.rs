use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gesture::{GestureProfile, TriggerBasis};
use crate::router::Breakpoints;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub lists: ListConfig,
    #[serde(default)]
    pub gestures: GestureConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
}

/// Backend service roots and HTTP behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Root for the `core` service (market, screener, watchlist, calendar, fundamentals…)
    #[serde(default = "default_core_base_url")]
    pub core_base_url: String,

    /// Root for the `assistant` service
    #[serde(default = "default_assistant_base_url")]
    pub assistant_base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for initial loads only
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// List pagination knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListConfig {
    /// Initial request size and growth step for server-paginated lists
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Server-enforced ceiling on the movers `limit` parameter
    #[serde(default = "default_movers_max")]
    pub movers_max: usize,

    /// Rows revealed per step for locally windowed lists (watchlist, opportunities)
    #[serde(default = "default_visible_increment")]
    pub visible_increment: usize,

    /// How close to the end of the visible rows a scroll must get to reveal more
    #[serde(default = "default_reveal_margin")]
    pub reveal_margin: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GestureConfig {
    #[serde(default = "default_drawer_profile")]
    pub drawer: ProfileConfig,

    #[serde(default = "default_pull_profile")]
    pub pull: ProfileConfig,

    /// Visual dampening factor applied to raw drag distance
    #[serde(default = "default_damping")]
    pub damping: f32,

    #[serde(default = "default_max_travel_px")]
    pub max_travel_px: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileConfig {
    pub floor_px: f32,
    pub height_fraction: f32,
    #[serde(default)]
    pub basis: TriggerBasis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// IANA name of the exchange timezone
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    #[serde(default = "default_open_refresh_secs")]
    pub open_refresh_secs: u64,

    #[serde(default = "default_extended_refresh_secs")]
    pub extended_refresh_secs: u64,

    #[serde(default = "default_closed_refresh_secs")]
    pub closed_refresh_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewportConfig {
    #[serde(default = "default_mobile_max")]
    pub mobile_max: u32,

    #[serde(default = "default_desktop_min")]
    pub desktop_min: u32,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_core_base_url() -> String {
    "http://localhost:8000/api".to_string()
}
fn default_assistant_base_url() -> String {
    "http://localhost:8000/assistant".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_max_retries() -> usize {
    2
}
fn default_retry_base_ms() -> u64 {
    250
}
fn default_user_agent() -> String {
    concat!("trade-assist/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_page_size() -> usize {
    20
}
fn default_movers_max() -> usize {
    20
}
fn default_visible_increment() -> usize {
    20
}
fn default_reveal_margin() -> usize {
    5
}
fn default_drawer_profile() -> ProfileConfig {
    ProfileConfig {
        floor_px: 100.0,
        height_fraction: 0.25,
        basis: TriggerBasis::Raw,
    }
}
fn default_pull_profile() -> ProfileConfig {
    ProfileConfig {
        floor_px: 100.0,
        height_fraction: 0.0,
        basis: TriggerBasis::Raw,
    }
}
fn default_damping() -> f32 {
    0.5
}
fn default_max_travel_px() -> f32 {
    150.0
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn default_tick_secs() -> u64 {
    60
}
fn default_open_refresh_secs() -> u64 {
    30
}
fn default_extended_refresh_secs() -> u64 {
    120
}
fn default_closed_refresh_secs() -> u64 {
    900
}
fn default_mobile_max() -> u32 {
    768
}
fn default_desktop_min() -> u32 {
    1024
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            core_base_url: default_core_base_url(),
            assistant_base_url: default_assistant_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            movers_max: default_movers_max(),
            visible_increment: default_visible_increment(),
            reveal_margin: default_reveal_margin(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drawer: default_drawer_profile(),
            pull: default_pull_profile(),
            damping: default_damping(),
            max_travel_px: default_max_travel_px(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tick_secs: default_tick_secs(),
            open_refresh_secs: default_open_refresh_secs(),
            extended_refresh_secs: default_extended_refresh_secs(),
            closed_refresh_secs: default_closed_refresh_secs(),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            mobile_max: default_mobile_max(),
            desktop_min: default_desktop_min(),
        }
    }
}

impl GestureConfig {
    pub fn drawer_profile(&self) -> GestureProfile {
        self.profile(&self.drawer)
    }

    pub fn pull_profile(&self) -> GestureProfile {
        self.profile(&self.pull)
    }

    fn profile(&self, p: &ProfileConfig) -> GestureProfile {
        GestureProfile {
            floor_px: p.floor_px,
            height_fraction: p.height_fraction,
            damping: self.damping,
            max_travel_px: self.max_travel_px,
            basis: p.basis,
        }
    }
}

impl SessionConfig {
    /// Parsed exchange timezone; falls back to New York on a bad name.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|e| {
            warn!("Failed to parse timezone '{}': {}", self.timezone, e);
            chrono_tz::America::New_York
        })
    }
}

impl ViewportConfig {
    pub fn breakpoints(&self) -> Breakpoints {
        Breakpoints {
            mobile_max: self.mobile_max,
            desktop_min: self.desktop_min,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TRADE_ASSIST").separator("__"))
            .build()?;

        let app_cfg = cfg.try_deserialize().unwrap_or_else(|e| {
            warn!("Invalid configuration, using defaults: {}", e);
            AppConfig::default()
        });
        Ok(app_cfg)
    }
}
