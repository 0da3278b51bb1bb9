//! # dynmorph Core Library
//!
//! Game-agnostic rule engine for character appearance morphs.
//!
//! Content authors describe how a character's morph channels react to the
//! game world in small JSON rule sets:
//!
//! - **Aliases** — named readouts of live signals (attributes, worn or
//!   innate keywords, other morph channels)
//! - **Rules** — arithmetic expressions over aliases, either *setters*
//!   (assign a channel) or *adders* (accumulate into a channel)
//! - **Rule sets** — per archetype/sex collections, layered from a master
//!   file and alphabetical overlays
//! - **Sessions** — a small transaction over one character's channels that
//!   remembers which part of every value this engine contributed, so the
//!   contribution can be retracted and recomputed each pass
//!
//! The host game is reached only through the [`CharacterModel`] and
//! [`FormLookup`] traits.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alias;
pub mod character;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod keyword;
pub mod metrics;
pub mod registry;
pub mod rule;
pub mod ruleset;
pub mod session;
pub mod symbol;
pub mod types;

pub use character::{CharacterModel, FormLookup};
pub use config::MorphConfig;
pub use engine::MorphEngine;
pub use error::{MorphError, Result};
pub use keyword::{KeywordMorph, KeywordMorphs};
pub use registry::{LoadReport, RuleSetRegistry};
pub use rule::CollisionPolicy;
pub use ruleset::{ResultTable, RuleSet};
pub use session::MorphSession;
pub use types::*;
