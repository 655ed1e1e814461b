// SPDX-License-Identifier: MIT

//! Dependency bundle handed to every handler

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::action::Action;
use super::error::TypelessError;

/// Sends actions into the global action stream
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Action>,
}

impl Dispatcher {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { tx }
    }

    /// Dispatch an action. Never fails from the caller's point of view; if
    /// the pipeline has stopped the action is dropped with a warning.
    pub fn dispatch(&self, action: Action) {
        if let Err(e) = self.tx.send(action) {
            log::warn!("Dispatch pipeline closed, dropping action {}", e.0);
        }
    }

    /// Dispatch an action, reporting a stopped pipeline
    pub fn try_dispatch(&self, action: Action) -> Result<(), TypelessError> {
        self.tx.send(action).map_err(|_| TypelessError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reads the latest committed state
pub struct StateAccessor<S> {
    rx: watch::Receiver<Arc<S>>,
}

impl<S> Clone for StateAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<S> StateAccessor<S> {
    pub fn new(rx: watch::Receiver<Arc<S>>) -> Self {
        Self { rx }
    }

    /// State as of the moment of the call, not of registration
    pub fn get(&self) -> Arc<S> {
        self.rx.borrow().clone()
    }
}

/// Read-only context shared by every handler of one pipeline
pub struct Deps<S> {
    state: StateAccessor<S>,
    dispatcher: Dispatcher,
}

impl<S> Clone for Deps<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<S> Deps<S> {
    pub fn new(state: StateAccessor<S>, dispatcher: Dispatcher) -> Self {
        Self { state, dispatcher }
    }

    pub fn state(&self) -> Arc<S> {
        self.state.get()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Shortcut for `deps.dispatcher().dispatch(action)`
    pub fn dispatch(&self, action: Action) {
        self.dispatcher.dispatch(action);
    }
}
