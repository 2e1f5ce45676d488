// SPDX-License-Identifier: CEPL-1.0
//! TOML configuration for the presentation loop.
//!
//! Every field has a default, so a partial (or missing) file is fine:
//!
//! ```toml
//! [render]
//! clear_color = [0.02, 0.02, 0.04, 1.0]
//! vsync = true
//! vsync_mode = "mailbox"
//! size_hint = [1280, 720]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "swapline.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub vsync_mode: VsyncMode,
    /// Initial window size; the surface may still dictate its own extent.
    pub size_hint: Option<[u32; 2]>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            clear_color: [0.02, 0.02, 0.04, 1.0],
            vsync: true,
            vsync_mode: VsyncMode::Fifo,
            size_hint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VsyncMode {
    /// Block on vertical blank; never tears.
    #[default]
    Fifo,
    /// Replace the queued image; uncapped without tearing.
    Mailbox,
}

pub fn parse_config(text: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(text)
}

pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read `path`, falling back to defaults when it is missing or malformed.
pub fn load_config(path: &Path) -> AppConfig {
    match read_config(path) {
        Ok(cfg) => cfg,
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            AppConfig::default()
        }
        Err(e) => {
            warn!("{e}; using defaults");
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").expect("empty config parses");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.render.vsync_mode, VsyncMode::Fifo);
        assert!(cfg.render.vsync);
    }

    #[test]
    fn partial_render_table_keeps_other_defaults() {
        let cfg = parse_config("[render]\nvsync_mode = \"mailbox\"\nsize_hint = [800, 600]\n")
            .expect("partial config parses");
        assert_eq!(cfg.render.vsync_mode, VsyncMode::Mailbox);
        assert_eq!(cfg.render.size_hint, Some([800, 600]));
        assert_eq!(cfg.render.clear_color, RenderConfig::default().clear_color);
    }

    #[test]
    fn unknown_vsync_mode_is_rejected() {
        assert!(parse_config("[render]\nvsync_mode = \"sometimes\"\n").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = Path::new("definitely/not/here/swapline.toml");
        assert!(matches!(read_config(path), Err(ConfigError::Read { .. })));
        assert_eq!(load_config(path), AppConfig::default());
    }
}
