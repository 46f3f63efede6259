mod common;

use common::{add_todo, counter, Counter, Recorder, TodoState};
use serde_json::json;
use statefold::{ArrayPolicy, Container, MergeError, MergeStrategy, StoreError, StoreHelper};
use std::cell::Cell;
use std::rc::Rc;

fn todo_store() -> (Container<TodoState>, StoreHelper<TodoState>) {
    let mut initial = TodoState::default();
    add_todo(&mut initial, "first");
    let store = Container::new(initial);
    let helper = StoreHelper::new(&store);
    (store, helper)
}

#[test]
fn test_merge_state_dispatches_strategies() {
    let (store, helper) = todo_store();

    helper
        .merge_state(json!({"filter": "open"}), MergeStrategy::Shallow)
        .unwrap();
    assert_eq!(store.get_state().filter, "open");
    assert_eq!(store.get_state().items.len(), 1);

    helper
        .merge_state(
            json!({"items": [{"id": 7, "text": "second", "done": true}]}),
            MergeStrategy::Deep(ArrayPolicy::Concat),
        )
        .unwrap();
    assert_eq!(store.get_state().items.len(), 2);

    helper
        .merge_state(json!({"filter": "done", "next_id": 8}), MergeStrategy::Draft)
        .unwrap();
    let state = store.get_state();
    assert_eq!(state.filter, "done");
    assert_eq!(state.next_id, 8);
    assert_eq!(state.items.len(), 2);
}

#[test]
fn test_draft_strategy_rejects_non_object() {
    let (store, helper) = todo_store();
    let before = store.get_state();
    let err = helper
        .merge_state(json!(["not", "an", "object"]), MergeStrategy::Draft)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        StoreError::Merge(MergeError::NotAnObject { side: "partial", .. })
    ));
    assert!(Rc::ptr_eq(&before, &store.get_state()));
}

#[test]
fn test_draft_strategy_type_mismatch_leaves_state() {
    let (store, helper) = todo_store();
    let before = store.get_state();
    assert!(helper
        .merge_state(json!({"next_id": "soon"}), MergeStrategy::Draft)
        .is_err());
    assert!(Rc::ptr_eq(&before, &store.get_state()));
}

#[test]
fn test_subscribe_to_ignores_unrelated_fields() {
    let store = Container::new(counter(0, 1));
    let helper = StoreHelper::new(&store);
    let log = Recorder::new();
    let log_in = log.clone();
    helper.subscribe_to(
        |s: &Counter| &s.count,
        move |new, old| log_in.push(format!("{old}->{new}")),
    );

    store.mutate(|c| c.step = 5).unwrap();
    assert_eq!(log.len(), 0);

    store.mutate(|c| c.count += c.step).unwrap();
    store.set_state(counter(5, 9)).unwrap();
    assert_eq!(log.entries(), vec!["0->5"]);
}

#[test]
fn test_batch_update_coalesces_notifications() {
    let (store, helper) = todo_store();
    let calls = Rc::new(Cell::new(0));
    let calls_in = Rc::clone(&calls);
    store.subscribe(move |_, _| calls_in.set(calls_in.get() + 1));

    helper
        .batch_update(|s| {
            add_todo(s, "a");
            add_todo(s, "b");
            add_todo(s, "c");
            s.filter = "all".into();
        })
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(store.get_state().items.len(), 4);
}

#[test]
fn test_replace_and_reset() {
    let (store, helper) = todo_store();
    let initial = store.get_state();

    helper.replace_state(TodoState::default()).unwrap();
    assert!(store.get_state().items.is_empty());

    helper.reset_state().unwrap();
    assert!(Rc::ptr_eq(&initial, &store.get_state()));
}

#[test]
fn test_chained_operations() -> Result<(), StoreError> {
    let store = Container::new(counter(0, 1));
    let helper = StoreHelper::new(&store);

    helper
        .merge_state(json!({"step": 3}), MergeStrategy::Shallow)?
        .batch_update(|c| c.count += c.step)?
        .batch_update(|c| c.count += c.step)?;

    assert_eq!(*helper.state(), counter(6, 3));
    assert!(helper.container().same_container(&store));
    Ok(())
}
