// SPDX-License-Identifier: MIT

//! Dispatch pipeline
//!
//! A single merge loop owns the inbound channel and processes one action at a
//! time: validate, publish (reducers/subscribers), then call every handler
//! registered for the action's kind. Each handler's output stream is drained
//! on its own task, which sends the validated outputs back into the same
//! inbound channel.

use futures::FutureExt;
use futures::StreamExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::action::Action;
use super::deps::{Deps, Dispatcher};
use super::diagnostics::{Diagnostic, DiagnosticEvent, DiagnosticSink, Verbosity};
use super::error::{EpicError, TypelessError};
use super::registry::HandlerTable;
use super::result::{ActionStream, Emit, Rejected};

/// Receiving side of the global action stream
#[derive(Debug)]
pub struct Inbound {
    rx: mpsc::UnboundedReceiver<Action>,
}

/// Create the global action stream
pub fn channel() -> (Dispatcher, Inbound) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher::new(tx), Inbound { rx })
}

/// Routes actions to handlers and merges their outputs
pub struct Pipeline<S> {
    table: Arc<HandlerTable<S>>,
    deps: Deps<S>,
    sink: Arc<dyn DiagnosticSink>,
    verbosity: Verbosity,
}

impl<S: Send + Sync + 'static> Pipeline<S> {
    pub fn new(
        table: HandlerTable<S>,
        deps: Deps<S>,
        sink: Arc<dyn DiagnosticSink>,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            table: Arc::new(table),
            deps,
            sink,
            verbosity,
        }
    }

    /// Call every handler registered for the action's kind, in registration
    /// order, then drain each handler's output on its own task.
    ///
    /// Handler bodies run here, before the next action is taken from the
    /// inbound channel, so they read the state committed for this action.
    /// Returns the number of handlers called. Must be called from within a
    /// Tokio runtime.
    pub fn route(&self, action: &Action) -> usize {
        let entries = self.table.get(action.kind().as_str());
        for entry in entries {
            if self.verbosity.traces() {
                self.sink.record(Diagnostic::trace(entry.epic(), action));
            }

            let task = HandlerTask {
                epic: entry.epic().to_string(),
                source: action.clone(),
                dispatcher: self.deps.dispatcher().clone(),
                sink: self.sink.clone(),
            };
            let span = tracing::debug_span!(
                "epic",
                epic = entry.epic(),
                action = %action.kind()
            );

            let handler = entry.instantiate(&self.deps);
            let source = action.clone();
            let called =
                span.in_scope(|| panic::catch_unwind(AssertUnwindSafe(|| handler(source))));
            match called {
                Ok(outputs) => {
                    tokio::spawn(task.run(outputs).instrument(span));
                }
                Err(payload) => task.panicked(payload.as_ref()),
            }
        }
        entries.len()
    }

    /// Spawn the merge loop.
    ///
    /// `publish` sees every well-formed action, external or handler-produced,
    /// before its handlers are called. If `publish` panics the action is
    /// reported and dropped. Dropping the returned handle stops the loop.
    pub fn spawn<F>(self, inbound: Inbound, publish: F) -> PipelineHandle
    where
        F: FnMut(&Action) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(inbound.rx, shutdown_rx, publish));
        PipelineHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run<F>(
        self,
        mut inbound: mpsc::UnboundedReceiver<Action>,
        mut shutdown: oneshot::Receiver<()>,
        mut publish: F,
    ) where
        F: FnMut(&Action) + Send + 'static,
    {
        log::debug!("Dispatch loop started with {} handlers", self.table.len());
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = inbound.recv() => match next {
                    Some(action) => self.process(action, &mut publish),
                    None => break,
                },
            }
        }
        log::debug!("Dispatch loop stopped");
    }

    fn process<F>(&self, action: Action, publish: &mut F)
    where
        F: FnMut(&Action),
    {
        if !action.is_well_formed() {
            self.sink
                .record(Diagnostic::new(DiagnosticEvent::InvalidDispatch { action }));
            return;
        }

        log::trace!("Processing action {}", action);
        // An action whose publish panicked was never committed; it is not routed
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| publish(&action))) {
            let error = panic_message(payload.as_ref());
            self.sink.record(Diagnostic::reducer_failed(&action, error));
            return;
        }
        self.route(&action);
    }
}

/// Handle to a running merge loop
#[derive(Debug)]
pub struct PipelineHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Stop the loop and wait for it to exit. Handler tasks already running
    /// finish on their own; their outputs are dropped.
    pub async fn shutdown(self) -> Result<(), TypelessError> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| TypelessError::other(format!("Dispatch loop failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// One handler execution for one source action
struct HandlerTask {
    epic: String,
    source: Action,
    dispatcher: Dispatcher,
    sink: Arc<dyn DiagnosticSink>,
}

impl HandlerTask {
    async fn run(self, outputs: ActionStream) {
        let outcome = AssertUnwindSafe(self.drive(outputs)).catch_unwind().await;
        if let Err(payload) = outcome {
            self.panicked(payload.as_ref());
        }
    }

    fn panicked(&self, payload: &(dyn Any + Send)) {
        let error = EpicError::Panicked(panic_message(payload));
        self.sink
            .record(Diagnostic::handler_failed(&self.epic, &self.source, error));
    }

    async fn drive(&self, mut outputs: ActionStream) {
        while let Some(item) = outputs.next().await {
            match item {
                Ok(emit) => self.forward(emit),
                Err(e) => {
                    self.sink
                        .record(Diagnostic::handler_failed(&self.epic, &self.source, e));
                    return;
                }
            }
        }
    }

    fn forward(&self, emit: Emit) {
        match emit.into_action() {
            Ok(action) => self.dispatcher.dispatch(action),
            Err(Rejected::Missing) => self
                .sink
                .record(Diagnostic::missing_action(&self.epic, &self.source)),
            Err(Rejected::Malformed(value)) => self.sink.record(Diagnostic::malformed_action(
                &self.epic,
                &self.source,
                value,
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
