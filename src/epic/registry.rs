// SPDX-License-Identifier: MIT

//! Handler table and epic composition
//!
//! An [`Epic`] collects handler registrations keyed by action kind. Epics are
//! composed with [`Epic::attach`] while the application is being built and
//! flattened into one [`HandlerTable`] before the pipeline starts.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::action::{Action, ActionCreator, ActionKind};
use super::deps::Deps;
use super::error::HandlerError;
use super::result::{failed, ActionStream, EpicResult};

pub type HandlerResult = Result<EpicResult, HandlerError>;

/// A handler bound to its dependencies. Calling it runs the handler body
/// immediately; only the returned stream is lazy.
pub type Handler = Box<dyn FnOnce(Action) -> ActionStream + Send>;

/// Produces a handler from the pipeline's dependency bundle
pub type HandlerFactory<S> = Arc<dyn Fn(&Deps<S>) -> Handler + Send + Sync>;

/// One registration in the table
pub struct HandlerEntry<S> {
    epic: String,
    factory: HandlerFactory<S>,
}

impl<S> HandlerEntry<S> {
    /// Name of the epic that registered this handler
    pub fn epic(&self) -> &str {
        &self.epic
    }

    pub fn instantiate(&self, deps: &Deps<S>) -> Handler {
        (self.factory)(deps)
    }
}

impl<S> Clone for HandlerEntry<S> {
    fn clone(&self) -> Self {
        Self {
            epic: self.epic.clone(),
            factory: self.factory.clone(),
        }
    }
}

/// Action kind -> handlers in registration order
pub struct HandlerTable<S> {
    entries: HashMap<ActionKind, Vec<HandlerEntry<S>>>,
}

impl<S> HandlerTable<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn push(
        &mut self,
        kind: ActionKind,
        epic: impl Into<String>,
        factory: HandlerFactory<S>,
    ) {
        self.entries.entry(kind).or_default().push(HandlerEntry {
            epic: epic.into(),
            factory,
        });
    }

    /// Handlers for a kind; empty when none are registered
    pub fn get(&self, kind: &str) -> &[HandlerEntry<S>] {
        self.entries.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ActionKind> {
        self.entries.keys()
    }

    /// Total number of registrations across all kinds
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every entry of `other` after the existing entries of each kind
    pub fn merge(&mut self, other: HandlerTable<S>) {
        for (kind, handlers) in other.entries {
            self.entries.entry(kind).or_default().extend(handlers);
        }
    }
}

impl<S> Default for HandlerTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for HandlerTable<S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<S> fmt::Debug for HandlerTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, handlers) in &self.entries {
            let epics: Vec<&str> = handlers.iter().map(|h| h.epic.as_str()).collect();
            map.entry(&kind.as_str(), &epics);
        }
        map.finish()
    }
}

/// A named set of handlers, composable with other epics
pub struct Epic<S> {
    name: String,
    handlers: HandlerTable<S>,
}

impl<S> fmt::Debug for Epic<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Epic")
            .field("name", &self.name)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl<S: Send + Sync + 'static> Epic<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HandlerTable::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handlers(&self) -> &HandlerTable<S> {
        &self.handlers
    }

    pub fn into_table(self) -> HandlerTable<S> {
        self.handlers
    }

    /// Merge another epic's handlers into this one.
    ///
    /// Entries are appended, never replaced. Attaching the same epic twice
    /// registers its handlers twice.
    pub fn attach(&mut self, epic: Epic<S>) -> &mut Self {
        log::debug!(
            "Attaching epic '{}' ({} handlers) to '{}'",
            epic.name,
            epic.handlers.len(),
            self.name
        );
        self.handlers.merge(epic.handlers);
        self
    }

    /// Register a typed handler. The payload is decoded before the call;
    /// a decode failure is reported like any other handler error.
    pub fn on<P, F>(&mut self, creator: &ActionCreator<P>, handler: F) -> &mut Self
    where
        P: Serialize + DeserializeOwned + 'static,
        F: Fn(P, &Deps<S>, &Action) -> HandlerResult + Send + Sync + 'static,
    {
        let creator = creator.clone();
        self.add(vec![creator.kind().clone()], move |_, deps, action| {
            let payload = creator.decode(action)?;
            handler(payload, deps, action)
        })
    }

    /// Register an untyped handler for one kind
    pub fn on_kind<K, F>(&mut self, kind: K, handler: F) -> &mut Self
    where
        K: Into<ActionKind>,
        F: Fn(Option<&Value>, &Deps<S>, &Action) -> HandlerResult + Send + Sync + 'static,
    {
        self.add(vec![kind.into()], handler)
    }

    /// Register one untyped handler for several kinds
    pub fn on_many<I, K, F>(&mut self, kinds: I, handler: F) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ActionKind>,
        F: Fn(Option<&Value>, &Deps<S>, &Action) -> HandlerResult + Send + Sync + 'static,
    {
        self.add(kinds.into_iter().map(Into::into).collect(), handler)
    }

    fn add<F>(&mut self, kinds: Vec<ActionKind>, handler: F) -> &mut Self
    where
        F: Fn(Option<&Value>, &Deps<S>, &Action) -> HandlerResult + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        for kind in kinds {
            let handler = handler.clone();
            let factory: HandlerFactory<S> = Arc::new(move |deps: &Deps<S>| {
                let handler = handler.clone();
                let deps = deps.clone();
                Box::new(move |action: Action| -> ActionStream {
                    match handler(action.payload(), &deps, &action) {
                        Ok(result) => result.into_stream(),
                        Err(e) => failed(e),
                    }
                }) as Handler
            });
            self.handlers.push(kind, self.name.clone(), factory);
        }
        self
    }
}
