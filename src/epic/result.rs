// SPDX-License-Identifier: MIT

//! Handler output and its normalization into a uniform action stream

use futures::future::{self, Future};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use super::action::Action;
use super::error::HandlerError;

/// Uniform lazy sequence every handler result is normalized into
pub type ActionStream = BoxStream<'static, Result<Emit, HandlerError>>;

/// One item emitted by a handler, validated before it re-enters the stream
#[derive(Debug, Clone, PartialEq)]
pub enum Emit {
    /// A typed action
    Action(Action),
    /// Nothing was produced where an action was expected
    Missing,
    /// An untyped value that must look like `{ "type": "...", "payload": ... }`
    Raw(Value),
}

/// Why an emitted item was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum Rejected {
    Missing,
    Malformed(Value),
}

impl Emit {
    /// Validate the item into a well-formed action
    pub fn into_action(self) -> Result<Action, Rejected> {
        match self {
            Emit::Action(action) if action.is_well_formed() => Ok(action),
            Emit::Action(action) => Err(Rejected::Malformed(action.to_value())),
            Emit::Missing | Emit::Raw(Value::Null) => Err(Rejected::Missing),
            Emit::Raw(value) => Action::from_value(&value).ok_or(Rejected::Malformed(value)),
        }
    }
}

impl From<Action> for Emit {
    fn from(action: Action) -> Self {
        Emit::Action(action)
    }
}

impl From<Option<Action>> for Emit {
    fn from(action: Option<Action>) -> Self {
        action.map_or(Emit::Missing, Emit::Action)
    }
}

impl From<Value> for Emit {
    fn from(value: Value) -> Self {
        Emit::Raw(value)
    }
}

/// What a handler returns.
///
/// The variants are explicit so a list of actions is never confused with a
/// single structured action.
pub enum EpicResult {
    /// The handler only performed side effects
    Empty,
    Single(Emit),
    /// Emitted in list order
    Many(Vec<Emit>),
    /// Lazy asynchronous sequence, used as-is
    Stream(ActionStream),
}

impl EpicResult {
    pub fn single(item: impl Into<Emit>) -> Self {
        EpicResult::Single(item.into())
    }

    pub fn many<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Emit>,
    {
        EpicResult::Many(items.into_iter().map(Into::into).collect())
    }

    /// Wrap an infallible stream of items
    pub fn stream<St, T>(items: St) -> Self
    where
        St: Stream<Item = T> + Send + 'static,
        T: Into<Emit>,
    {
        EpicResult::Stream(
            items
                .map(|item| Ok::<Emit, HandlerError>(item.into()))
                .boxed(),
        )
    }

    /// Wrap a stream that may fail part way; the first error ends it
    pub fn try_stream<St>(items: St) -> Self
    where
        St: Stream<Item = Result<Emit, HandlerError>> + Send + 'static,
    {
        EpicResult::Stream(items.boxed())
    }

    /// Emit one item after `delay` without blocking anything else
    pub fn delayed(item: impl Into<Emit>, delay: Duration) -> Self {
        let item = item.into();
        EpicResult::Stream(
            stream::once(async move {
                tokio::time::sleep(delay).await;
                Ok::<_, HandlerError>(item)
            })
            .boxed(),
        )
    }

    /// Run an async computation and emit whatever it resolves to
    pub fn future<F>(computation: F) -> Self
    where
        F: Future<Output = Result<EpicResult, HandlerError>> + Send + 'static,
    {
        EpicResult::Stream(
            stream::once(computation)
                .map(|outcome| match outcome {
                    Ok(result) => result.into_stream(),
                    Err(e) => failed(e),
                })
                .flatten()
                .boxed(),
        )
    }

    pub fn into_stream(self) -> ActionStream {
        match self {
            EpicResult::Empty => stream::empty().boxed(),
            EpicResult::Single(item) => stream::once(future::ready(Ok(item))).boxed(),
            EpicResult::Many(items) => {
                stream::iter(items.into_iter().map(Ok::<_, HandlerError>)).boxed()
            }
            EpicResult::Stream(items) => items,
        }
    }
}

/// A stream that fails immediately
pub(crate) fn failed(error: HandlerError) -> ActionStream {
    stream::once(future::ready(Err(error))).boxed()
}

impl fmt::Debug for EpicResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpicResult::Empty => f.write_str("Empty"),
            EpicResult::Single(item) => f.debug_tuple("Single").field(item).finish(),
            EpicResult::Many(items) => f.debug_tuple("Many").field(items).finish(),
            EpicResult::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Action> for EpicResult {
    fn from(action: Action) -> Self {
        EpicResult::Single(Emit::Action(action))
    }
}

impl From<Vec<Action>> for EpicResult {
    fn from(actions: Vec<Action>) -> Self {
        EpicResult::many(actions)
    }
}

impl From<Option<Action>> for EpicResult {
    fn from(action: Option<Action>) -> Self {
        EpicResult::Single(action.into())
    }
}
