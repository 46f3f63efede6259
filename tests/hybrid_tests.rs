use statefold::{HybridError, HybridState, HybridStore, StoreError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type Snapshots<D> = Rc<RefCell<Vec<HybridState<D>>>>;

fn record<D: Clone + 'static>(store: &HybridStore<D>) -> Snapshots<D> {
    let seen: Snapshots<D> = Rc::new(RefCell::new(Vec::new()));
    let seen_in = Rc::clone(&seen);
    store
        .container()
        .subscribe(move |next, _| seen_in.borrow_mut().push((**next).clone()));
    seen
}

#[derive(Debug)]
struct NotFound(&'static str);

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not found", self.0)
    }
}

#[tokio::test]
async fn test_success_sets_data_and_clears_flags() {
    let store = HybridStore::new(Vec::<String>::new());
    let seen = record(&store);

    store
        .execute(async { Ok::<_, NotFound>("alpha".to_string()) }, |data, item| {
            let mut next = data.clone();
            next.push(item);
            next
        })
        .await
        .unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].is_loading);
    assert!(seen[0].error.is_none());
    assert!(!seen[1].is_loading);
    assert!(seen[1].error.is_none());
    assert_eq!(seen[1].data, vec!["alpha".to_string()]);
    assert!(seen[1].last_update.is_some());
}

#[tokio::test]
async fn test_failure_is_committed_before_it_is_returned() {
    let store = HybridStore::new(0u32);
    let seen = record(&store);

    let observed_at_return = Rc::new(RefCell::new(None));
    let result = store
        .execute_replace(async { Err::<u32, _>(NotFound("post")) })
        .await;
    *observed_at_return.borrow_mut() = Some(store.container().get_state());

    match result {
        Err(StoreError::Async(err)) => assert_eq!(err.message, "post not found"),
        other => panic!("unexpected result: {other:?}"),
    }

    let state = observed_at_return.borrow().clone().unwrap();
    assert!(!state.is_loading);
    assert_eq!(state.error, Some(HybridError::new("post not found")));
    assert_eq!(state.data, 0, "data survives a failure");

    // pending commit, then exactly one settle commit carrying both flags
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].is_loading && seen[0].error.is_none());
    assert!(!seen[1].is_loading && seen[1].error.is_some());
}

#[tokio::test]
async fn test_new_operation_clears_previous_error() {
    let store = HybridStore::new(1u32);
    let _ = store.execute_replace(async { Err::<u32, _>("boom") }).await;
    assert!(store.error().is_some());

    store.execute_replace(async { Ok::<_, String>(2) }).await.unwrap();
    assert!(store.error().is_none());
    assert_eq!(store.data(), 2);
}

#[tokio::test]
async fn test_loading_is_visible_while_suspended() {
    let store = Rc::new(HybridStore::new(0u32));
    let (tx, rx) = tokio::sync::oneshot::channel::<u32>();

    let observer = Rc::clone(&store);
    let op = store.execute_replace(async move { rx.await.map_err(|e| e.to_string()) });
    let check = async move {
        tokio::task::yield_now().await;
        assert!(observer.is_loading());
        tx.send(7).unwrap();
    };
    let (result, ()) = tokio::join!(op, check);
    result.unwrap();
    assert!(!store.is_loading());
    assert_eq!(store.data(), 7);
}

#[tokio::test]
async fn test_overlapping_operations_last_writer_wins() {
    let store = HybridStore::new(String::new());
    let (slow_tx, slow_rx) = tokio::sync::oneshot::channel::<String>();

    let slow = store.execute_replace(async move { slow_rx.await.map_err(|e| e.to_string()) });
    let fast = async {
        store
            .execute_replace(async { Ok::<_, String>("fast".to_string()) })
            .await
            .unwrap();
        slow_tx.send("slow".to_string()).unwrap();
    };
    let (slow_result, ()) = tokio::join!(slow, fast);
    slow_result.unwrap();

    assert_eq!(store.data(), "slow");
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_injected_lookup_collaborator() {
    // Slug uniqueness check against an injected async lookup.
    let taken: HashMap<&str, u32> = HashMap::from([("hello-world", 1)]);
    let lookup = |slug: &'static str| {
        let found = taken.get(slug).copied();
        async move { Ok::<Option<u32>, NotFound>(found) }
    };

    let store = HybridStore::new(None::<bool>);
    store
        .execute(lookup("hello-world"), |_, found| Some(found.is_none()))
        .await
        .unwrap();
    assert_eq!(store.data(), Some(false));

    store
        .execute(lookup("fresh-post"), |_, found| Some(found.is_none()))
        .await
        .unwrap();
    assert_eq!(store.data(), Some(true));
}

#[test]
fn test_sync_setters_are_single_commits() {
    let store = HybridStore::new(vec![1, 2]);
    let seen = record(&store);

    store.set_loading(true).unwrap();
    store.set_error("disk full").unwrap();
    {
        let seen = seen.borrow();
        let last = seen.last().unwrap();
        assert!(!last.is_loading);
        assert_eq!(last.error.as_ref().unwrap().message, "disk full");
    }

    store.clear_error().unwrap();
    store.set_data(vec![3]).unwrap();
    assert_eq!(store.data(), vec![3]);
    assert!(store.error().is_none());

    store.reset().unwrap();
    assert_eq!(*store.container().get_state(), HybridState::new(vec![1, 2]));
    assert_eq!(seen.borrow().len(), 5);
}

#[test]
fn test_subscriber_error_does_not_hide_async_failure() {
    let store = HybridStore::new(0u8);
    store.container().try_subscribe(|_, _| Err("listener broke".into()));

    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let result = rt.block_on(store.execute_replace(async { Err::<u8, _>("op failed") }));
    assert!(matches!(result, Err(StoreError::Async(ref e)) if e.message == "op failed"));
    assert!(store.error().is_some());
}
