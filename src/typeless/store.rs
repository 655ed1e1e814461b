// SPDX-License-Identifier: MIT

//! Single state store: commits reducer output and publishes applied actions

use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::reducer::Reducer;
use crate::epic::{Action, StateAccessor};

struct Inner<S> {
    reducer: Arc<dyn Reducer<S>>,
    state: watch::Sender<Arc<S>>,
    actions: broadcast::Sender<Action>,
}

/// Holds the current state. Cloning shares the same store.
pub struct Store<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Send + Sync + 'static> Store<S> {
    /// `capacity` bounds how far a subscriber may fall behind before it
    /// starts skipping actions.
    pub fn new(initial: S, reducer: Arc<dyn Reducer<S>>, capacity: usize) -> Self {
        let (state, _) = watch::channel(Arc::new(initial));
        let (actions, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                reducer,
                state,
                actions,
            }),
        }
    }

    /// Reduce, commit, then publish the action to subscribers
    pub fn apply(&self, action: &Action) {
        let current = self.state();
        let next = self.inner.reducer.reduce(&current, action);
        self.inner.state.send_replace(Arc::new(next));

        // No subscribers is fine
        let _ = self.inner.actions.send(action.clone());
    }

    pub fn state(&self) -> Arc<S> {
        self.inner.state.borrow().clone()
    }

    pub fn accessor(&self) -> StateAccessor<S> {
        StateAccessor::new(self.inner.state.subscribe())
    }

    /// Every action applied after this call, in commit order
    pub fn subscribe(&self) -> BoxStream<'static, Action> {
        let stream =
            BroadcastStream::new(self.inner.actions.subscribe()).filter_map(|item| match item {
                Ok(action) => Some(action),
                Err(e) => {
                    log::warn!("Subscriber fell behind: {}", e);
                    None
                }
            });
        Box::pin(stream)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.actions.receiver_count()
    }
}
