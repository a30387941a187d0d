//! Grid-world Markov Decision Processes.
//!
//! This crate provides:
//! - A stochastic grid world with obstacles, rewarding and punishing exits
//! - Offline value iteration producing a value landscape and greedy policy
//! - Online Q-learning against a live world
//! - Presets, JSON world descriptions, CSV export of learning curves

pub mod agent;
pub mod display;
pub mod environment;
pub mod error;
pub mod export;
pub mod policy;
pub mod presets;
pub mod rl;
pub mod utils;
pub mod value_iteration;

pub use agent::{Agent, EpisodeOutcome};
pub use environment::{Cell, Env, Movement, Pos, Rewards};
pub use error::{Error, Result};
pub use policy::{DetPolicy, Policy};
pub use presets::{Preset, WorldSpec};
pub use rl::{LearningReport, QLearning, QLearningConfig, QTable};
pub use value_iteration::{ValueIteration, ValueIterationConfig};
