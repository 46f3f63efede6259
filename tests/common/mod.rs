#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use statefold::Container;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub count: i64,
    pub step: i64,
}

pub fn counter(count: i64, step: i64) -> Counter {
    Counter { count, step }
}

pub fn increment_by_step(store: &Container<Counter>) {
    store.mutate(|c| c.count += c.step).unwrap();
}

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoState {
    pub items: Vec<TodoItem>,
    pub filter: String,
    pub next_id: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub text: String,
    pub done: bool,
}

pub fn add_todo(state: &mut TodoState, text: &str) {
    state.items.push(TodoItem {
        id: state.next_id,
        text: text.to_string(),
        done: false,
    });
    state.next_id += 1;
}

/// Shared, clonable log of strings written by listeners.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<String>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }
}
