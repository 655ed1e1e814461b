// SPDX-License-Identifier: MIT

//! typeless-rs - actions, reducers and epics for a single application store
//!
//! - [`epic`] routes every dispatched action to the handlers registered for
//!   its kind and feeds their output back into the action stream
//! - [`typeless`] adds modules, reducers, the store and the runtime

pub mod epic;
pub mod typeless;
