//! Host-side configuration (`dynmorph.toml`).
//!
//! Wraps the core [`MorphConfig`] under `[engine]` and adds the settings
//! that only make sense inside a running game: scheduling intervals and
//! the keyword morph system.

use std::path::Path;

use dynmorph_core::config::MorphConfig;
use dynmorph_core::types::CharacterId;
use dynmorph_core::{MorphError, Result};
use serde::{Deserialize, Serialize};

/// Complete host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Core engine settings.
    #[serde(default)]
    pub engine: MorphConfig,
    /// Re-evaluation scheduling.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Keyword morphs on worn equipment.
    #[serde(default)]
    pub keywords: KeywordConfig,
}

impl HostConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MorphError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| MorphError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Debounce intervals and the default watchlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum time between periodic re-evaluations of one character.
    #[serde(default = "default_actor_interval_ms")]
    pub actor_interval_ms: u64,
    /// Minimum time between re-evaluations of the menu preview character.
    #[serde(default = "default_menu_actor_interval_ms")]
    pub menu_actor_interval_ms: u64,
    /// Put the player on the watchlist at startup.
    #[serde(default = "default_true")]
    pub watch_player: bool,
    /// Host ID of the player character.
    #[serde(default = "default_player_id")]
    pub player_id: u32,
}

impl SchedulerConfig {
    /// The player as a character ID.
    #[must_use]
    pub fn player(&self) -> CharacterId {
        CharacterId(self.player_id)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            actor_interval_ms: default_actor_interval_ms(),
            menu_actor_interval_ms: default_menu_actor_interval_ms(),
            watch_player: true,
            player_id: default_player_id(),
        }
    }
}

/// Keyword morph settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Whether worn keywords contribute morphs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Marker that makes a keyword a morph keyword.
    #[serde(default = "default_editor_id_prefix")]
    pub editor_id_prefix: String,
    /// Prefix of the shadow channels for keyword contributions.
    #[serde(default = "default_keyword_offset_prefix")]
    pub offset_prefix: String,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            editor_id_prefix: default_editor_id_prefix(),
            offset_prefix: default_keyword_offset_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde requires named functions)
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_actor_interval_ms() -> u64 {
    200
}
fn default_menu_actor_interval_ms() -> u64 {
    300
}
fn default_player_id() -> u32 {
    CharacterId::PLAYER.0
}
fn default_editor_id_prefix() -> String {
    "ECArmorMorph_".to_string()
}
fn default_keyword_offset_prefix() -> String {
    "ECKwOffset_".to_string()
}
