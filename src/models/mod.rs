//! Data models for copyrandom.
//!
//! This module contains the core data structures shared by the engine and its callers:
//! - [`RunConfig`]: The immutable parameter set for one run, loaded from `copyrandom.yaml`
//! - [`RunState`]: The observable progress snapshot held by [`StateManager`](crate::state::StateManager)
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: `RunConfig` and its option types derive `Serialize`/`Deserialize` for YAML persistence
//! - **Versioned**: `RunConfig::version` guards the on-disk schema
//! - **Passive**: no filesystem access happens here; the services own all I/O

pub mod config;
pub mod run_state;

pub use config::{
    CONFIG_VERSION, ConfigError, DurationRange, DurationUnit, FileNameMode, FilterLists,
    FolderOptions, Quota, RunConfig, SizeRange, SizeUnit, TrashOptions, WeightCaps,
};
pub use run_state::RunState;
