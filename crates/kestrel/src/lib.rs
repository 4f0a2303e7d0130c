//! # KESTREL
//!
//! Frame loop and startup wiring around the ECS core.
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────────────────────────┐
//! │  kestrel.toml    │─────>│  GameLoop                                │
//! │  [world] + loop  │      │  ┌─────────┐   ┌────────────────────┐    │
//! └──────────────────┘      │  │  World  │<──│  Scheduler         │    │
//!                           │  └─────────┘   │  early/update/late │    │
//! ┌──────────────────┐      │                │  + cleanup sweep   │    │
//! │  init_logging    │      │                └────────────────────┘    │
//! │  (RUST_LOG)      │      │  FrameStatsAccumulator                   │
//! └──────────────────┘      └──────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: `kestrel.toml` loading
//! - `game_loop`: Frame orchestration and timing
//! - `telemetry`: `tracing` subscriber setup

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod game_loop;
pub mod telemetry;

pub use kestrel_core as core;

pub use config::GameLoopConfig;
pub use error::LoopError;
pub use game_loop::{FrameStatsAccumulator, GameLoop};
pub use telemetry::init_logging;
