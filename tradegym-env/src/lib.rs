//! tradegym env — gym-style episode wrapper over the core simulator.
//!
//! This crate consumes the core's outputs (fills, snapshots) and contains no
//! matching or accounting logic of its own:
//! - Episode configuration (TOML, content-addressed ids)
//! - Bar loading with cache → download → synthetic fallback
//! - Observation windows of adjusted market features plus account state
//! - Scenario-specific action decoding (simple / average / multi_vol)
//! - Reward functions

pub mod config;
pub mod env;
pub mod loader;
pub mod observation;
pub mod reward;
pub mod scenario;

pub use config::EpisodeConfig;
pub use env::{make_env, EnvError, StepInfo, TradingEnv, Transition};
pub use loader::{load_history, LoadError, LoadOptions, LoadedHistory};
pub use observation::Observation;
pub use reward::RewardKind;
pub use scenario::Scenario;
