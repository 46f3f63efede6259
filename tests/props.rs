use proptest::prelude::*;
use serde_json::{json, Value};
use statefold::{
    deep_merge, ArrayPolicy, Container, FileStorage, History, StorageAdapter, StoreReader,
    StoredValue,
};
use std::rc::Rc;
use tempfile::tempdir;

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-100i64..100).prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::from),
    ]
}

fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            proptest::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_policy() -> impl Strategy<Value = ArrayPolicy> {
    prop_oneof![
        Just(ArrayPolicy::Concat),
        Just(ArrayPolicy::Replace),
        Just(ArrayPolicy::MergeByIndex),
    ]
}

// However many commits happen, the past never grows beyond its bound.
proptest! {
    #[test]
    fn prop_history_bounded(max in 0usize..8, values in proptest::collection::vec(any::<i32>(), 0..40)) {
        let store = Container::new(0i32);
        let history = History::new(&store, max);
        for v in values {
            store.set_state(v).unwrap();
            prop_assert!(history.past_len() <= max);
        }
    }
}

// Undoing everything and redoing everything returns the same reference.
proptest! {
    #[test]
    fn prop_undo_redo_returns_to_present(values in proptest::collection::vec(any::<i32>(), 1..20)) {
        let store = Container::new(0i32);
        let history = History::new(&store, 50);
        for v in values {
            store.set_state(v).unwrap();
        }
        let present = store.get_state();
        while history.undo().unwrap() {}
        while history.redo().unwrap() {}
        prop_assert!(Rc::ptr_eq(&present, &store.get_state()));
    }
}

// Merging two objects keeps every key of both sides. Keys only in the
// target keep their value, and the source value wins unless both sides
// are objects or the arrays are concatenated.
proptest! {
    #[test]
    fn prop_deep_merge_key_union(
        target in proptest::collection::btree_map("[a-e]", arb_json(), 0..5),
        source in proptest::collection::btree_map("[a-e]", arb_json(), 0..5),
        policy in arb_policy(),
    ) {
        let t = Value::Object(target.clone().into_iter().collect());
        let s = Value::Object(source.clone().into_iter().collect());
        let merged = deep_merge(&t, &s, policy);
        let merged = merged.as_object().unwrap();

        let mut keys: Vec<&String> = target.keys().chain(source.keys()).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(merged.keys().collect::<Vec<_>>(), keys);

        for (key, value) in &target {
            if !source.contains_key(key) {
                prop_assert_eq!(&merged[key], value);
            }
        }
        for (key, value) in &source {
            let old = target.get(key);
            let both_objects = value.is_object() && old.is_some_and(Value::is_object);
            let concatenated = policy == ArrayPolicy::Concat
                && value.is_array()
                && old.is_some_and(Value::is_array);
            if !both_objects && !concatenated {
                prop_assert_eq!(&merged[key], value);
            }
        }
    }
}

// Any finite float survives a write and read through file storage.
proptest! {
    #[test]
    fn prop_file_storage_float_exact(values in proptest::collection::vec(
        any::<f64>().prop_filter("finite", |v| v.is_finite()), 1..8)) {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let stored = StoredValue::new(json!({"v": values}), 0);
        storage.set_item("floats", &stored).unwrap();
        prop_assert_eq!(storage.get_item("floats").unwrap(), Some(stored));
    }
}

// Concatenated arrays hold every element of both sides, target first.
proptest! {
    #[test]
    fn prop_concat_length(a in proptest::collection::vec(any::<i16>(), 0..10),
                          b in proptest::collection::vec(any::<i16>(), 0..10)) {
        let merged = deep_merge(&json!({"xs": &a}), &json!({"xs": &b}), ArrayPolicy::Concat);
        let xs = merged["xs"].as_array().unwrap();
        prop_assert_eq!(xs.len(), a.len() + b.len());
        let expected: Vec<Value> = a.iter().chain(b.iter()).map(|n| json!(n)).collect();
        prop_assert_eq!(xs, &expected);
    }
}

// Merging an object into itself changes nothing under Replace.
proptest! {
    #[test]
    fn prop_replace_merge_idempotent(value in arb_json()) {
        let merged = deep_merge(&value, &value, ArrayPolicy::Replace);
        prop_assert_eq!(merged, value);
    }
}

// A selector hands back the same Rc until its output actually changes.
proptest! {
    #[test]
    fn prop_selector_stable(values in proptest::collection::vec(0i32..6, 1..30)) {
        let store = Container::new(0i32);
        let selector = StoreReader::new(&store).select(|n: &i32| n / 3);
        let mut last = selector.get();
        for v in values {
            store.set_state(v).unwrap();
            let next = selector.get();
            if *next == *last {
                prop_assert!(Rc::ptr_eq(&next, &last));
            }
            last = next;
        }
    }
}
