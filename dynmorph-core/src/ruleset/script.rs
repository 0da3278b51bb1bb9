//! JSON rule scripts.
//!
//! ```json
//! {
//!   "Aliases": {
//!     "str":   { "EditorID": "AttrStrength", "Type": "actorValue" },
//!     "heavy": { "EditorID": "ArmorHeavy", "Type": "wornKeyword", "Default": 0 }
//!   },
//!   "Rules": {
//!     "Adders":  { "Thin": "heavy * 0.1" },
//!     "Setters": { "Strong": "str / 100" }
//!   }
//! }
//! ```
//!
//! Every entry is applied independently: a bad alias or rule is logged,
//! recorded in the [`FileReport`] and skipped.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use super::RuleSet;
use crate::alias::AliasKind;
use crate::character::FormLookup;
use crate::error::{MorphError, Result};
use crate::rule::CollisionPolicy;

/// Outcome of loading one script file.
#[derive(Debug, Default)]
pub struct FileReport {
    /// Script path (empty for in-memory scripts).
    pub path: PathBuf,
    /// Aliases registered.
    pub aliases_loaded: usize,
    /// Rules accepted.
    pub rules_loaded: usize,
    /// Entries that were skipped, with the reason.
    pub errors: Vec<MorphError>,
}

impl FileReport {
    /// Whether every entry loaded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl RuleSet {
    /// Load a script file into this set.
    ///
    /// `clear` empties the set first. Rules merge with existing ones under
    /// `policy`. Errors are returned only when the file as a whole cannot
    /// be read or decoded; entry failures go into the report.
    pub fn parse_script(
        &mut self,
        path: &Path,
        clear: bool,
        policy: CollisionPolicy,
        forms: &dyn FormLookup,
    ) -> Result<FileReport> {
        let text = std::fs::read_to_string(path)?;
        self.parse_script_str(&text, path, clear, policy, forms)
    }

    /// Load a script from text. `path` is used for reporting only.
    pub fn parse_script_str(
        &mut self,
        text: &str,
        path: &Path,
        clear: bool,
        policy: CollisionPolicy,
        forms: &dyn FormLookup,
    ) -> Result<FileReport> {
        let root: Value = serde_json::from_str(text)?;
        let Value::Object(root) = root else {
            return Err(MorphError::Script {
                path: path.to_path_buf(),
                message: "top level is not an object".to_string(),
            });
        };

        if clear {
            self.clear();
        }

        let mut report = FileReport {
            path: path.to_path_buf(),
            ..FileReport::default()
        };

        if let Some(aliases) = section(&root, "Aliases", path, &mut report) {
            for (name, definition) in aliases {
                match self.parse_alias_entry(name, definition, forms) {
                    Ok(()) => report.aliases_loaded += 1,
                    Err(e) => {
                        error!(path = %path.display(), alias = %name, "{e}");
                        report.errors.push(e);
                    }
                }
            }
        }

        if let Some(rules) = section(&root, "Rules", path, &mut report) {
            // Adders first so that setters in the same file win.
            for (group, is_setter) in [("Adders", false), ("Setters", true)] {
                let Some(entries) = section(rules, group, path, &mut report) else {
                    continue;
                };
                for (channel, expr) in entries {
                    let result = match expr.as_str() {
                        Some(expr) => self.parse_rule(channel, expr, is_setter, policy),
                        None => Err(MorphError::Script {
                            path: path.to_path_buf(),
                            message: format!("rule for '{channel}' is not a string"),
                        }),
                    };
                    match result {
                        Ok(()) => report.rules_loaded += 1,
                        Err(e) => {
                            error!(path = %path.display(), channel = %channel, "{e}");
                            report.errors.push(e);
                        }
                    }
                }
            }
        }

        self.mark_loaded();
        info!(
            path = %path.display(),
            aliases = report.aliases_loaded,
            rules = report.rules_loaded,
            errors = report.errors.len(),
            "Loaded morph rule script"
        );
        Ok(report)
    }

    fn parse_alias_entry(
        &mut self,
        name: &str,
        definition: &Value,
        forms: &dyn FormLookup,
    ) -> Result<()> {
        let Some(editor_id) = definition.get("EditorID").and_then(Value::as_str) else {
            return Err(MorphError::MissingEditorId(name.to_string()));
        };
        let kind = match definition.get("Type").and_then(Value::as_str) {
            None => AliasKind::Any,
            Some(type_name) => AliasKind::from_script_name(type_name).unwrap_or_else(|| {
                warn!(alias = name, alias_type = type_name, "Unknown alias type, trying all");
                AliasKind::Any
            }),
        };
        let default = definition
            .get("Default")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        self.parse_alias(name, editor_id, kind, default, forms)
    }
}

/// Object-valued member `key` of `parent`. A present but non-object member
/// is reported and treated as absent.
fn section<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &Path,
    report: &mut FileReport,
) -> Option<&'a Map<String, Value>> {
    match parent.get(key)? {
        Value::Object(map) => Some(map),
        _ => {
            let e = MorphError::Script {
                path: path.to_path_buf(),
                message: format!("'{key}' is not an object"),
            };
            error!(path = %path.display(), "{e}");
            report.errors.push(e);
            None
        }
    }
}
