//! Configuration for the morph engine.
//!
//! Maps directly to the `[engine]` table of `dynmorph.toml`; every field
//! has a default so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::DiffMode;

/// Top-level engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorphConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Session commit behaviour.
    #[serde(default)]
    pub session: SessionConfig,
    /// Rule-set discovery.
    #[serde(default)]
    pub rules: RulesConfig,
}

impl MorphConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MorphError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::MorphError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether morph evaluation runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

/// How sessions track and commit their changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Prefix of the shadow channels holding this engine's contribution.
    #[serde(default = "default_offset_prefix")]
    pub offset_prefix: String,
    /// Norm used to measure a session's change.
    #[serde(default)]
    pub diff_mode: DiffMode,
    /// Changes at or below this norm are not worth a visual refresh.
    #[serde(default = "default_diff_threshold")]
    pub diff_threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            offset_prefix: default_offset_prefix(),
            diff_mode: DiffMode::default(),
            diff_threshold: default_diff_threshold(),
        }
    }
}

/// Where rule sets come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Root of the per-archetype folder tree.
    #[serde(default = "default_rules_root")]
    pub root: PathBuf,
    /// Load a rule set the first time it is requested instead of scanning
    /// every folder when game data finishes loading.
    #[serde(default = "default_true")]
    pub lazy_load: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            root: default_rules_root(),
            lazy_load: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde requires named functions)
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_offset_prefix() -> String {
    "ECOffset_".to_string()
}
fn default_diff_threshold() -> f32 {
    0.05
}
fn default_rules_root() -> PathBuf {
    PathBuf::from("Data/SKSE/Plugins/DynamicMorphs/Rules")
}
