//! # dynmorph-host — Host Integration for dynmorph
//!
//! This crate sits between the game-agnostic `dynmorph-core` engine and the
//! host game's event hooks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Host game                    │
//! │   hooks ──▶ EventBus ──▶ MorphManager        │
//! │                             │                │
//! │                 ┌───────────┼───────────┐    │
//! │                 ▼           ▼           ▼    │
//! │            Scheduler    ActorWorld   Systems │
//! │                                         │    │
//! │                   ┌─────────────────────┘    │
//! │                   ▼                          │
//! │          ┌──────────────────┐                │
//! │          │   dynmorph-core  │                │
//! │          └──────────────────┘                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config` — `dynmorph.toml`: engine, scheduler and keyword settings
//! - `logging` — `tracing-subscriber` setup
//! - `events` — typed host events and the event bus
//! - `hooks` — constructors used by the host's detours to publish events
//! - `scheduler` — watchlist, pending set and per-character rate limiting
//! - `bridge` — in-memory actors and form database implementing the core traits
//! - `systems` — one re-evaluation pass over an actor
//! - `manager` — wires everything to the event bus

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod config;
pub mod events;
pub mod hooks;
pub mod logging;
pub mod manager;
pub mod scheduler;
pub mod systems;

pub use bridge::{Actor, ActorWorld, FormDatabase, NpcData};
pub use config::HostConfig;
pub use events::{EquipKind, EventBus, HostEvent};
pub use manager::MorphManager;
pub use scheduler::{ReevaluationScheduler, TickOutcome};
