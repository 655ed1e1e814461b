// SPDX-License-Identifier: MIT

//! Runtime: wires modules, store and dispatch loop together
//!
//! Registration happens on a [`RuntimeBuilder`]; [`RuntimeBuilder::start`]
//! freezes the handler table and spawns the dispatch loop. Nothing can be
//! registered afterwards.

use futures::stream::BoxStream;
use std::sync::Arc;

use super::config::EngineConfig;
use super::module::Module;
use super::reducer::{CombinedReducer, Reducer};
use super::store::Store;
use crate::epic::{
    default_sink, pipeline, Action, Deps, DiagnosticSink, Dispatcher, Epic, Pipeline,
    PipelineHandle, TypelessError,
};

/// Collects modules, epics and reducers before start
pub struct RuntimeBuilder<S> {
    initial: S,
    epics: Vec<Epic<S>>,
    reducers: Vec<Arc<dyn Reducer<S>>>,
    config: EngineConfig,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl<S: Send + Sync + 'static> RuntimeBuilder<S> {
    fn new(initial: S) -> Self {
        Self {
            initial,
            epics: Vec::new(),
            reducers: Vec::new(),
            config: EngineConfig::default(),
            sink: None,
        }
    }

    /// Add a module's epic and reducer
    pub fn module(mut self, module: Module<S>) -> Self {
        let (epic, reducer) = module.into_parts();
        self.epics.push(epic);
        if let Some(reducer) = reducer {
            self.reducers.push(reducer);
        }
        self
    }

    pub fn epic(mut self, epic: Epic<S>) -> Self {
        self.epics.push(epic);
        self
    }

    pub fn reducer<R>(mut self, reducer: R) -> Self
    where
        R: Reducer<S> + 'static,
    {
        self.reducers.push(Arc::new(reducer));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Where contained failures are reported. Defaults to the `log` facade.
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Spawn the dispatch loop. Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<Runtime<S>, TypelessError>
    where
        S: Clone,
    {
        self.config.validate()?;

        let mut root = Epic::new(self.config.name.clone());
        for epic in self.epics {
            root.attach(epic);
        }
        let table = root.into_table();

        let reducer: Arc<dyn Reducer<S>> = Arc::new(CombinedReducer::new(self.reducers));
        let store = Store::new(self.initial, reducer, self.config.subscriber_capacity);

        let (dispatcher, inbound) = pipeline::channel();
        let deps = Deps::new(store.accessor(), dispatcher.clone());
        let sink = self.sink.unwrap_or_else(default_sink);

        log::info!(
            "Starting runtime '{}' with {} handlers ({:?})",
            self.config.name,
            table.len(),
            self.config.verbosity
        );

        let publisher = store.clone();
        let handle = Pipeline::new(table, deps, sink, self.config.verbosity)
            .spawn(inbound, move |action: &Action| publisher.apply(action));

        Ok(Runtime {
            name: self.config.name,
            store,
            dispatcher,
            handle,
        })
    }
}

/// A running store and dispatch loop
pub struct Runtime<S> {
    name: String,
    store: Store<S>,
    dispatcher: Dispatcher,
    handle: PipelineHandle,
}

impl<S: Send + Sync + 'static> Runtime<S> {
    pub fn builder(initial: S) -> RuntimeBuilder<S> {
        RuntimeBuilder::new(initial)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire and forget; handler failures never reach the caller
    pub fn dispatch(&self, action: Action) {
        self.dispatcher.dispatch(action);
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn state(&self) -> Arc<S> {
        self.store.state()
    }

    /// Every validated action, external or handler-produced, from now on
    pub fn subscribe(&self) -> BoxStream<'static, Action> {
        self.store.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the dispatch loop. Actions dispatched afterwards are dropped.
    pub async fn shutdown(self) -> Result<(), TypelessError> {
        log::info!("Shutting down runtime '{}'", self.name);
        self.handle.shutdown().await
    }
}
