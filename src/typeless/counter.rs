// SPDX-License-Identifier: MIT

//! Counter module
//!
//! `startCount` marks the counter as loading; after a delay the epic answers
//! with `countDone { count: 1 }`, which clears the flag and adds to the count.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::module::Module;
use super::reducer::ReducerBuilder;
use crate::epic::{ActionCreator, EpicResult};

pub const NAMESPACE: &str = "counter";

/// Default time between `startCount` and `countDone`
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterState {
    pub is_loading: bool,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDone {
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct CounterActions {
    pub start_count: ActionCreator<()>,
    pub count_done: ActionCreator<CountDone>,
}

/// Build the counter module with the given answer delay
pub fn counter_module(delay: Duration) -> (Module<CounterState>, CounterActions) {
    let module = Module::new(NAMESPACE);
    let actions = CounterActions {
        start_count: module.action("startCount"),
        count_done: module.action("countDone"),
    };

    let done = actions.count_done.clone();
    let reducer = ReducerBuilder::new()
        .on(&actions.start_count, |state: &CounterState, _: ()| {
            CounterState {
                is_loading: true,
                ..state.clone()
            }
        })
        .on(&actions.count_done, |state: &CounterState, done: CountDone| {
            CounterState {
                is_loading: false,
                count: state.count + done.count,
            }
        });

    let module = module
        .with_epic(|epic| {
            epic.on(&actions.start_count, move |_, _, _| {
                Ok(EpicResult::delayed(done.create(CountDone { count: 1 }), delay))
            });
        })
        .with_reducer(reducer);

    (module, actions)
}
