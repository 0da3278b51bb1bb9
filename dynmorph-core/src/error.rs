//! Error types for the dynmorph core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::expr::CompileError;
use crate::types::CharacterId;

/// Top-level error type for all dynmorph operations.
#[derive(Error, Debug)]
pub enum MorphError {
    /// A rule expression failed to compile.
    #[error("Rule for '{target}' failed to compile: {source}")]
    Compile {
        /// Target channel of the rejected rule.
        target: String,
        /// Underlying compiler error.
        #[source]
        source: CompileError,
    },

    /// The alias name is already bound or is not a legal identifier.
    #[error("Symbol redefinition or illegal symbol name: '{0}'")]
    SymbolRedefinition(String),

    /// None of the requested alias kinds could resolve the reference.
    #[error("Cannot parse as {attempted}: Alias: '{alias}' EditorID: '{reference}'")]
    UnresolvedAlias {
        /// Alias name.
        alias: String,
        /// Editor ID (or channel name) that failed to resolve.
        reference: String,
        /// Human-readable list of the resolutions that were tried.
        attempted: String,
    },

    /// An alias definition is missing its `EditorID` field.
    #[error("When parsing Alias '{0}': No EditorID found in definition")]
    MissingEditorId(String),

    /// A rule would make its target channel depend on itself.
    #[error("Circular reference detected in morph rule for '{target}' with symbol: '{symbol}'")]
    CircularReference {
        /// Channel the rejected rule targets.
        target: String,
        /// Alias through which the cycle was reached.
        symbol: String,
    },

    /// The character has no readable model data right now.
    #[error("Character {0} has no model data")]
    NoModelData(CharacterId),

    /// A rule-set script is structurally invalid.
    #[error("Invalid rule script {path:?}: {message}")]
    Script {
        /// Script path (empty for in-memory scripts).
        path: PathBuf,
        /// What was wrong.
        message: String,
    },

    /// JSON decoding failure.
    #[error("Failed to parse json format: {0}")]
    Json(#[from] serde_json::Error),

    /// A keyword morph script could not be decoded.
    #[error("Failed to parse morph keyword script '{script}': {reason}")]
    KeywordScript {
        /// The raw script text.
        script: String,
        /// Why decoding failed.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, MorphError>;
