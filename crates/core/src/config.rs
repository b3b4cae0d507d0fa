use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Geometry and behaviour knobs for one timeline.
///
/// Heights are in the host's vertical unit (CSS pixels for a browser
/// surface, terminal rows for the TUI, see [`TimelineConfig::terminal`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Width of one time bucket in nanoseconds.
    pub bucket_width_ns: u64,
    /// Height of one event line inside a lane cell.
    pub row_height: u32,
    /// Minimum height of a bucket row before its border.
    pub min_cell_height: u32,
    pub border_height: u32,
    /// Extra distance above and below the viewport within which buckets
    /// count as visible, so content is built just before it scrolls in.
    pub prerender_margin: u32,
    /// Quiet period before a scroll-position sample is evaluated.
    pub scroll_debounce_ms: u64,
    /// Drop the content of buckets that leave the visible window.
    pub evict_offscreen: bool,
    /// Longest string argument shown before truncation.
    pub max_arg_len: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            bucket_width_ns: 10_000_000,
            row_height: 24,
            min_cell_height: 5,
            border_height: 1,
            prerender_margin: 0,
            scroll_debounce_ms: 200,
            evict_offscreen: false,
            max_arg_len: 40,
        }
    }
}

impl TimelineConfig {
    /// Preset for character-cell surfaces: one event per row, a one-row
    /// separator between buckets.
    pub fn terminal() -> Self {
        Self {
            row_height: 1,
            min_cell_height: 0,
            border_height: 1,
            prerender_margin: 8,
            scroll_debounce_ms: 50,
            ..Self::default()
        }
    }

    /// Parse a JSON config. Missing keys fall back to the defaults.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_width_ns == 0 {
            return Err(ConfigError::Invalid("bucket_width_ns must be positive"));
        }
        if self.row_height == 0 {
            return Err(ConfigError::Invalid("row_height must be positive"));
        }
        Ok(())
    }
}
