// SPDX-License-Identifier: MIT

//! Pure reducers: `(State, Action) -> State`

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::epic::{Action, ActionCreator, ActionKind};

/// Computes the next state from the current state and an action
pub trait Reducer<S>: Send + Sync {
    fn reduce(&self, state: &S, action: &Action) -> S;
}

impl<S, F> Reducer<S> for F
where
    F: Fn(&S, &Action) -> S + Send + Sync,
{
    fn reduce(&self, state: &S, action: &Action) -> S {
        self(state, action)
    }
}

type CaseFn<S> = Box<dyn Fn(&S, &Action) -> S + Send + Sync>;

/// Reducer keyed by action kind.
///
/// Unmatched actions leave the state unchanged. Several cases for the same
/// kind are applied in registration order.
pub struct ReducerBuilder<S> {
    cases: HashMap<ActionKind, Vec<CaseFn<S>>>,
}

impl<S: Clone + 'static> ReducerBuilder<S> {
    pub fn new() -> Self {
        Self {
            cases: HashMap::new(),
        }
    }

    /// Handle one kind with its decoded payload
    pub fn on<P, F>(mut self, creator: &ActionCreator<P>, reduce: F) -> Self
    where
        P: Serialize + DeserializeOwned + 'static,
        F: Fn(&S, P) -> S + Send + Sync + 'static,
    {
        let decoder = creator.clone();
        let case = move |state: &S, action: &Action| match decoder.decode(action) {
            Ok(payload) => reduce(state, payload),
            Err(e) => {
                log::error!("Reducer skipped action: {}", e);
                state.clone()
            }
        };
        self.cases
            .entry(creator.kind().clone())
            .or_default()
            .push(Box::new(case));
        self
    }

    /// Handle one kind with the raw action
    pub fn on_kind<K, F>(mut self, kind: K, reduce: F) -> Self
    where
        K: Into<ActionKind>,
        F: Fn(&S, &Action) -> S + Send + Sync + 'static,
    {
        self.cases
            .entry(kind.into())
            .or_default()
            .push(Box::new(reduce));
        self
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.cases.contains_key(kind)
    }
}

impl<S: Clone + 'static> Default for ReducerBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone> Reducer<S> for ReducerBuilder<S> {
    fn reduce(&self, state: &S, action: &Action) -> S {
        match self.cases.get(action.kind().as_str()) {
            None => state.clone(),
            Some(cases) => cases
                .iter()
                .fold(state.clone(), |current, case| case(&current, action)),
        }
    }
}

/// Applies several reducers in order, each seeing the previous one's result
pub struct CombinedReducer<S> {
    reducers: Vec<Arc<dyn Reducer<S>>>,
}

impl<S> CombinedReducer<S> {
    pub fn new(reducers: Vec<Arc<dyn Reducer<S>>>) -> Self {
        Self { reducers }
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S: Clone> Reducer<S> for CombinedReducer<S> {
    fn reduce(&self, state: &S, action: &Action) -> S {
        self.reducers
            .iter()
            .fold(state.clone(), |current, reducer| reducer.reduce(&current, action))
    }
}
