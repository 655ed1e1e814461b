// SPDX-License-Identifier: MIT

//! Epic engine - routes dispatched actions to asynchronous handlers
//!
//! This module provides:
//! - `Action` / `ActionCreator` - action values and typed constructors
//! - `Epic` / `HandlerTable` - handler registration and composition
//! - `Pipeline` - the dispatch loop merging handler outputs back into the stream
//! - `Deps` - state accessor and dispatcher injected into every handler
//! - `DiagnosticSink` - where contained failures are reported

mod action;
mod deps;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
mod registry;
mod result;

pub use action::{Action, ActionCreator, ActionKind};
pub use deps::{Deps, Dispatcher, StateAccessor};
pub use diagnostics::{
    default_sink, Diagnostic, DiagnosticEvent, DiagnosticSink, LogSink, MemorySink, Verbosity,
};
pub use error::{EpicError, HandlerError, TypelessError};
pub use pipeline::{Inbound, Pipeline, PipelineHandle};
pub use registry::{Epic, Handler, HandlerEntry, HandlerFactory, HandlerResult, HandlerTable};
pub use result::{ActionStream, Emit, EpicResult, Rejected};
