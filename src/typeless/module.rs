// SPDX-License-Identifier: MIT

//! Module builder: one namespace with its actions, epic and reducer

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::reducer::Reducer;
use crate::epic::{ActionCreator, Epic};

/// A namespaced unit of state logic.
///
/// Action kinds are `namespace/name`, so two modules may declare actions
/// with the same name without colliding.
pub struct Module<S> {
    namespace: String,
    epic: Epic<S>,
    reducer: Option<Arc<dyn Reducer<S>>>,
}

impl<S: Send + Sync + 'static> Module<S> {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            epic: Epic::new(namespace.clone()),
            namespace,
            reducer: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Declare an action carrying payload `P`
    pub fn action<P>(&self, name: &str) -> ActionCreator<P>
    where
        P: Serialize + DeserializeOwned,
    {
        ActionCreator::new(format!("{}/{}", self.namespace, name))
    }

    /// The module's epic, named after the namespace
    pub fn epic(&mut self) -> &mut Epic<S> {
        &mut self.epic
    }

    /// Register handlers in one closure, builder style
    pub fn with_epic<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut Epic<S>),
    {
        build(&mut self.epic);
        self
    }

    /// Set the module reducer, replacing any previous one
    pub fn with_reducer<R>(mut self, reducer: R) -> Self
    where
        R: Reducer<S> + 'static,
    {
        self.reducer = Some(Arc::new(reducer));
        self
    }

    pub fn has_reducer(&self) -> bool {
        self.reducer.is_some()
    }

    pub fn into_parts(self) -> (Epic<S>, Option<Arc<dyn Reducer<S>>>) {
        (self.epic, self.reducer)
    }
}
