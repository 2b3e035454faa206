//! Storefront bridge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External widget runtime bridge
    pub widget: WidgetConfig,

    /// Overlay panel identifiers
    pub overlays: OverlayConfig,

    /// Signal names shared with the widget runtime
    pub signals: SignalConfig,

    /// Revalidation hardening
    pub revalidation: RevalidationConfig,

    /// Predictive search
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .storefront.yml
        let local_config = PathBuf::from(".storefront.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/storefront/storefront.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("storefront").join("storefront.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.widget.max_attempts == 0 {
            return Err(eyre::eyre!("widget.max-attempts must be at least 1"));
        }
        if self.widget.backoff_factor < 1.0 {
            return Err(eyre::eyre!(
                "widget.backoff-factor must be >= 1.0, got {}",
                self.widget.backoff_factor
            ));
        }
        if self.signals.channel_capacity == 0 {
            return Err(eyre::eyre!("signals.channel-capacity must be at least 1"));
        }
        let ids = [&self.overlays.cart_id, &self.overlays.search_id, &self.overlays.menu_id];
        if ids.iter().any(|id| id.is_empty() || id.starts_with('#')) {
            return Err(eyre::eyre!("overlay ids must be non-empty and must not include '#'"));
        }
        Ok(())
    }
}

/// Widget runtime bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Delay before the first readiness check
    #[serde(rename = "first-check-delay-ms")]
    pub first_check_delay_ms: u64,

    /// Total readiness checks before giving up (1 = single-shot)
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Multiplier applied to the delay after each failed check
    #[serde(rename = "backoff-factor")]
    pub backoff_factor: f64,

    /// Upper bound on the delay between checks
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Handle substring marking a gift clone product
    #[serde(rename = "gift-handle-marker")]
    pub gift_handle_marker: String,

    /// Tags marking a gift product
    #[serde(rename = "gift-tags")]
    pub gift_tags: Vec<String>,

    /// Delay before a product tile asks the runtime to customize it
    #[serde(rename = "customize-delay-ms")]
    pub customize_delay_ms: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            first_check_delay_ms: 500,
            max_attempts: 5,
            backoff_factor: 2.0,
            max_delay_ms: 4000,
            gift_handle_marker: "sca_clone_freegift".to_string(),
            gift_tags: vec!["bogos-gift".to_string()],
            customize_delay_ms: 500,
        }
    }
}

impl WidgetConfig {
    pub fn first_check_delay(&self) -> Duration {
        Duration::from_millis(self.first_check_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn customize_delay(&self) -> Duration {
        Duration::from_millis(self.customize_delay_ms)
    }

    /// Delay before readiness check number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.first_check_delay();
        }
        let factor = self.backoff_factor.powi((attempt - 1) as i32);
        let millis = (self.first_check_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Overlay panel identifiers, written into the URL fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    #[serde(rename = "cart-id")]
    pub cart_id: String,

    #[serde(rename = "search-id")]
    pub search_id: String,

    #[serde(rename = "menu-id")]
    pub menu_id: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            cart_id: "cart-aside".to_string(),
            search_id: "search-aside".to_string(),
            menu_id: "mobile-menu-aside".to_string(),
        }
    }
}

/// Signal names exchanged with the widget runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Dispatched by the runtime after it changes the gifts in the cart
    #[serde(rename = "gifts-updated")]
    pub gifts_updated: String,

    /// Dispatched by the core once a bundle page is mounted
    #[serde(rename = "bundle-page-init")]
    pub bundle_page_init: String,

    #[serde(rename = "bundle-init-delay-ms")]
    pub bundle_init_delay_ms: u64,

    /// Broadcast buffer per subscriber
    #[serde(rename = "channel-capacity")]
    pub channel_capacity: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            gifts_updated: "fg-gifts:updated".to_string(),
            bundle_page_init: "bogos:bundle-page-init".to_string(),
            bundle_init_delay_ms: 250,
            channel_capacity: 256,
        }
    }
}

impl SignalConfig {
    pub fn bundle_init_delay(&self) -> Duration {
        Duration::from_millis(self.bundle_init_delay_ms)
    }
}

/// Revalidation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevalidationConfig {
    /// Collapse signals arriving inside this window (0 disables)
    #[serde(rename = "debounce-ms")]
    pub debounce_ms: u64,
}

impl RevalidationConfig {
    pub fn debounce(&self) -> Option<Duration> {
        (self.debounce_ms > 0).then(|| Duration::from_millis(self.debounce_ms))
    }
}

/// Predictive search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Wait this long after input before querying (0 disables)
    #[serde(rename = "debounce-ms")]
    pub debounce_ms: u64,

    /// Maximum products requested per query
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 0,
            limit: 10,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Option<Duration> {
        (self.debounce_ms > 0).then(|| Duration::from_millis(self.debounce_ms))
    }
}
