// SPDX-License-Identifier: MIT

//! Store layer built on the epic engine
//!
//! This module provides:
//! - `Module` - a namespace bundling actions, an epic and a reducer
//! - `Reducer` / `ReducerBuilder` - pure state transitions
//! - `Store` - committed state plus a stream of applied actions
//! - `Runtime` - starts the dispatch loop for a set of modules
//! - `EngineConfig` - runtime settings from YAML or the environment

pub mod config;
pub mod counter;
mod module;
mod reducer;
mod runtime;
mod store;

pub use config::{ConfigLoader, EngineConfig};
pub use module::Module;
pub use reducer::{CombinedReducer, Reducer, ReducerBuilder};
pub use runtime::{Runtime, RuntimeBuilder};
pub use store::Store;
