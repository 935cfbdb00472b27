use crate::error::{CoreError, Result};
use crate::player::PlayingMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenzaConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_page_scale")]
    pub vol_page_scale: usize,
    #[serde(default = "default_page_scale")]
    pub single_page_scale: usize,
    #[serde(default = "default_page_scale")]
    pub article_page_scale: usize,
    /// Number of page numbers shown at once by the page selector
    #[serde(default = "default_pagination_window")]
    pub pagination_window: usize,
    /// Delay between showing the cache and reconciling with the remote source
    #[serde(default = "default_reconcile_delay")]
    pub reconcile_delay_ms: u64,
}

const fn default_page_scale() -> usize {
    3 * 4
}

const fn default_pagination_window() -> usize {
    9
}

const fn default_reconcile_delay() -> u64 {
    10
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            vol_page_scale: default_page_scale(),
            single_page_scale: default_page_scale(),
            article_page_scale: default_page_scale(),
            pagination_window: default_pagination_window(),
            reconcile_delay_ms: default_reconcile_delay(),
        }
    }
}

impl CatalogConfig {
    #[must_use]
    pub const fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub mode: PlayingMode,
    /// Upper bound of a single random shuffle step
    #[serde(default = "default_shuffle_step")]
    pub shuffle_max_step: usize,
}

const fn default_volume() -> u8 {
    100
}

const fn default_shuffle_step() -> usize {
    30
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            mode: PlayingMode::default(),
            shuffle_max_step: default_shuffle_step(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Delay before an exiting view is sent to the background; must outlast the CSS transition
    #[serde(default = "default_teardown_delay")]
    pub teardown_delay_ms: u64,
    /// Delay before a selected item is scrolled into view and highlighted
    #[serde(default = "default_highlight_delay")]
    pub highlight_delay_ms: u64,
    #[serde(default = "default_raised_stack_order")]
    pub raised_stack_order: i32,
    #[serde(default = "default_overlay_stack_order")]
    pub overlay_stack_order: i32,
    #[serde(default = "default_background_stack_order")]
    pub background_stack_order: i32,
}

const fn default_teardown_delay() -> u64 {
    500
}

const fn default_highlight_delay() -> u64 {
    200
}

const fn default_raised_stack_order() -> i32 {
    5
}

const fn default_overlay_stack_order() -> i32 {
    20
}

const fn default_background_stack_order() -> i32 {
    -1
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            teardown_delay_ms: default_teardown_delay(),
            highlight_delay_ms: default_highlight_delay(),
            raised_stack_order: default_raised_stack_order(),
            overlay_stack_order: default_overlay_stack_order(),
            background_stack_order: default_background_stack_order(),
        }
    }
}

impl ViewConfig {
    #[must_use]
    pub const fn teardown_delay(&self) -> Duration {
        Duration::from_millis(self.teardown_delay_ms)
    }

    #[must_use]
    pub const fn highlight_delay(&self) -> Duration {
        Duration::from_millis(self.highlight_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api/".to_string()
}

const fn default_timeout() -> u64 {
    10
}

const fn default_max_retries() -> u32 {
    3
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to the cache directory
    #[serde(default)]
    pub enabled: bool,
}

impl CadenzaConfig {
    /// Get the config file path (~/.config/cadenza/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location or create the template on first run
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if the file
    /// cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from `path`, writing the template there if it does not exist
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if the file
    /// cannot be read, parsed or validated.
    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate config text
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a value is out of range.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let scales = [
            ("catalog.vol_page_scale", self.catalog.vol_page_scale),
            ("catalog.single_page_scale", self.catalog.single_page_scale),
            ("catalog.article_page_scale", self.catalog.article_page_scale),
            ("catalog.pagination_window", self.catalog.pagination_window),
            ("playback.shuffle_max_step", self.playback.shuffle_max_step),
        ];
        if let Some((field, _)) = scales.iter().find(|(_, value)| *value == 0) {
            return Err(CoreError::ConfigInvalid {
                message: format!("{field} must be greater than zero"),
            });
        }

        if self.playback.volume > 100 {
            return Err(CoreError::ConfigInvalid {
                message: format!("playback.volume must be 0-100, got {}", self.playback.volume),
            });
        }

        if self.remote.base_url.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "remote.base_url must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

pub const CONFIG_TEMPLATE: &str = r#"# Cadenza Configuration
# ~/.config/cadenza/config.toml

[catalog]
vol_page_scale = 12
single_page_scale = 12
article_page_scale = 12
# Number of page numbers shown by the page selector
pagination_window = 9
reconcile_delay_ms = 10

[playback]
volume = 100
# "order", "shuffle" or "loop"
mode = "order"
shuffle_max_step = 30

[view]
teardown_delay_ms = 500
highlight_delay_ms = 200
raised_stack_order = 5
overlay_stack_order = 20
background_stack_order = -1

[remote]
base_url = "http://127.0.0.1:8080/api/"
timeout_secs = 10
max_retries = 3

[logging]
# Write logs to ~/.cache/cadenza/cadenza.log in addition to the console
enabled = false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = CadenzaConfig::parse(CONFIG_TEMPLATE).unwrap();
        let defaults = CadenzaConfig::default();

        assert_eq!(config.catalog.single_page_scale, defaults.catalog.single_page_scale);
        assert_eq!(config.catalog.pagination_window, 9);
        assert_eq!(config.playback.volume, 100);
        assert_eq!(config.playback.mode, PlayingMode::Order);
        assert_eq!(config.view.teardown_delay(), Duration::from_millis(500));
        assert_eq!(config.view.highlight_delay(), Duration::from_millis(200));
        assert_eq!(config.remote.max_retries, 3);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CadenzaConfig::parse("").unwrap();
        assert_eq!(config.catalog.single_page_scale, 12);
        assert_eq!(config.view.overlay_stack_order, 20);
        assert_eq!(config.view.background_stack_order, -1);
    }

    #[test]
    fn test_partial_section() {
        let config = CadenzaConfig::parse("[playback]\nmode = \"shuffle\"\n").unwrap();
        assert_eq!(config.playback.mode, PlayingMode::Shuffle);
        assert_eq!(config.playback.volume, 100);
    }

    #[test]
    fn test_zero_page_scale_rejected() {
        let err = CadenzaConfig::parse("[catalog]\nsingle_page_scale = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_volume_out_of_range_rejected() {
        let err = CadenzaConfig::parse("[playback]\nvolume = 150\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_malformed_toml() {
        let err = CadenzaConfig::parse("[catalog\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParseError(_)));
    }

    #[test]
    fn test_load_or_create_writes_template() {
        let dir = std::env::temp_dir().join(format!("cadenza-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = fs::remove_file(&path);

        let err = CadenzaConfig::load_or_create_at(&path).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }));
        assert!(path.exists());

        let config = CadenzaConfig::load_or_create_at(&path).unwrap();
        assert_eq!(config.catalog.pagination_window, 9);

        let _ = fs::remove_dir_all(&dir);
    }
}
