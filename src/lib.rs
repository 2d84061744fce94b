// copyrandom - random file sampler and copier
//
// This is the library crate containing the sampling engine, its configuration
// and the run controller. The binary crate (main.rs) provides the CLI entry point.

pub mod config;
pub mod control;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use control::{RunController, RunHandle};
pub use models::{RunConfig, RunState};
pub use services::{Orchestrator, RunError, RunReport, RunStatus, StopSignal};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
