// Control module - the boundary a caller drives a run through
//
// This module contains:
// - RunController: starts a run on a tokio runtime and stops it on request
// - RunHandle: the event stream and completion of one started run

pub mod controller;

pub use controller::{RunController, RunHandle};
