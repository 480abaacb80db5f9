/// Integration tests for SyncArray
/// These tests drive the engine through a LocalSource, covering event
/// application, the listener lifecycle and notification fan-out.

use std::sync::Arc;

use ordo_client::SyncArray;
use ordo_shared::{
    Cancellation, ChangeEvent, ChangeEventListener, ChildEvent, RemoteError,
    SubscriptionEventListener, SyncError, ValueEvent,
};
use ordo_test::{
    assert_child_events, assert_keys, assert_unique_keys, local_pair, local_pair_with, snap,
    CountingSubscriber, Gate, GatedSnapshot, LocalSource, ReadBackListener, Recorded,
    RecordingListener, TestSnapshot,
};

fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

#[test]
fn added_in_sequence_builds_order() {
    init_logging();
    let (source, array) = local_pair();
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());

    source.push_child(snap("a", "1")).unwrap();
    source.push_child(snap("b", "2")).unwrap();
    source.push_child(snap("c", "3")).unwrap();

    assert_keys!(array, ["a", "b", "c"]);
    assert_child_events!(
        listener,
        [
            ChangeEvent::Added { index: 0 },
            ChangeEvent::Added { index: 1 },
            ChangeEvent::Added { index: 2 },
        ]
    );
}

#[test]
fn added_at_head_without_previous_key() {
    let (source, array) = local_pair_with(&["a", "b"]);
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());
    listener.clear();

    source.insert_child(0, snap("z", "0")).unwrap();

    assert_keys!(array, ["z", "a", "b"]);
    assert_child_events!(listener, [ChangeEvent::Added { index: 0 }]);
}

#[test]
fn removed_middle_child() {
    let (source, array) = local_pair_with(&["a", "b", "c"]);
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());
    listener.clear();

    source.remove_child("b").unwrap();

    assert_keys!(array, ["a", "c"]);
    assert_child_events!(listener, [ChangeEvent::Removed { index: 1 }]);
}

#[test]
fn moved_head_after_tail() {
    let (source, array) = local_pair_with(&["a", "b", "c"]);
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());
    listener.clear();

    // lands after "c"
    source.move_child("a", 2).unwrap();

    assert_keys!(array, ["b", "c", "a"]);
    assert_child_events!(
        listener,
        [ChangeEvent::Moved {
            index: 2,
            old_index: 0
        }]
    );
}

#[test]
fn moved_behind_its_predecessor_keeps_order() {
    let (source, array) = local_pair_with(&["a", "b", "c"]);
    array.add_change_listener(RecordingListener::new());

    let result = source.deliver(ChildEvent::moved(snap("b", "b"), Some("a")));

    assert!(result.is_ok());
    assert_keys!(array, ["a", "b", "c"]);
}

#[test]
fn changed_replaces_payload_in_place() {
    let (source, array) = local_pair_with(&["a", "b"]);
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());
    listener.clear();

    source.update_child(snap("b", "b-prime")).unwrap();

    assert_keys!(array, ["a", "b"]);
    assert_eq!(array.get(1).map(|s| s.value().clone()), Some("b-prime".to_string()));
    assert_child_events!(listener, [ChangeEvent::Changed { index: 1 }]);
}

#[test]
fn removed_unknown_key_surfaces_key_not_found() {
    init_logging();
    let (source, array) = local_pair_with(&["a", "b", "c"]);
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());
    listener.clear();

    let result = source.deliver(ChildEvent::removed(snap("x", "x")));

    match result {
        Err(SyncError::KeyNotFound { key }) => assert_eq!(key, "x"),
        other => panic!("Expected KeyNotFound, got {:?}", other),
    }
    assert_keys!(array, ["a", "b", "c"]);
    assert!(listener.events().is_empty(), "No listener should hear about a rejected event");
}

#[test]
fn changed_and_moved_unknown_keys_are_rejected() {
    let (source, array) = local_pair_with(&["a", "b"]);
    array.add_change_listener(RecordingListener::new());

    assert!(matches!(
        source.deliver(ChildEvent::changed(snap("x", "x"))),
        Err(SyncError::KeyNotFound { .. })
    ));
    assert!(matches!(
        source.deliver(ChildEvent::moved(snap("x", "x"), None)),
        Err(SyncError::KeyNotFound { .. })
    ));
    assert!(matches!(
        source.deliver(ChildEvent::added(snap("c", "c"), Some("x"))),
        Err(SyncError::KeyNotFound { .. })
    ));
    assert!(matches!(
        source.deliver(ChildEvent::moved(snap("a", "a"), Some("x"))),
        Err(SyncError::KeyNotFound { .. })
    ));
    assert_keys!(array, ["a", "b"]);
}

#[test]
fn duplicate_added_is_rejected() {
    let (source, array) = local_pair_with(&["a", "b"]);
    array.add_change_listener(RecordingListener::new());

    let result = source.deliver(ChildEvent::added(snap("a", "again"), Some("b")));

    assert_eq!(
        result,
        Err(SyncError::DuplicateKey {
            key: "a".to_string()
        })
    );
    assert_keys!(array, ["a", "b"]);
    assert_unique_keys!(array);
}

#[test]
fn first_listener_subscribes_once() {
    let (source, array) = local_pair();
    assert!(!array.is_listening());
    assert_eq!(source.child_subscriptions(), (0, 0));

    array.add_change_listener(RecordingListener::new());
    assert_eq!(source.child_subscriptions(), (1, 0));
    assert_eq!(source.value_subscriptions(), (1, 0));

    array.add_change_listener(RecordingListener::new());
    assert_eq!(source.child_subscriptions(), (1, 0));
    assert_eq!(source.value_subscriptions(), (1, 0));
    assert_eq!(source.child_listener_count(), 1);
    assert!(array.is_listening());
}

#[test]
fn last_listener_removal_unsubscribes_and_clears() {
    let (source, array) = local_pair_with(&["a", "b"]);
    let first = array.add_change_listener(RecordingListener::new());
    let second = array.add_change_listener(RecordingListener::new());
    assert_eq!(array.len(), 2);

    array.remove_change_listener(&first).unwrap();
    assert!(array.is_listening());
    assert_eq!(array.len(), 2);
    assert_eq!(source.child_subscriptions(), (1, 0));

    array.remove_change_listener(&second).unwrap();
    assert!(!array.is_listening());
    assert!(array.is_empty());
    assert_eq!(source.child_subscriptions(), (1, 1));
    assert_eq!(source.value_subscriptions(), (1, 1));
    assert_eq!(source.child_listener_count(), 0);
    assert_eq!(source.value_listener_count(), 0);

    // idle engines do not see remote changes
    source.push_child(snap("c", "c")).unwrap();
    assert!(array.is_empty());
}

#[test]
fn resubscription_matches_cold_start() {
    let (source, array) = local_pair_with(&["a", "b", "c"]);
    let handle = array.add_change_listener(RecordingListener::new());

    source.move_child("c", 0).unwrap();
    source.remove_child("a").unwrap();
    array.remove_change_listener(&handle).unwrap();

    source.push_child(snap("d", "d")).unwrap();
    source.move_child("d", 1).unwrap();
    source.insert_child(0, snap("e", "e")).unwrap();

    array.add_change_listener(RecordingListener::new());

    let cold = SyncArray::<TestSnapshot>::new(source.clone());
    cold.add_change_listener(RecordingListener::new());

    assert_eq!(array.keys(), source.keys());
    assert_eq!(array.keys(), cold.keys());
    assert_eq!(array.to_vec(), cold.to_vec());
}

#[test]
fn replay_is_followed_by_checkpoint() {
    let (_source, array) = local_pair_with(&["a", "b"]);
    let listener = RecordingListener::new();

    array.add_change_listener(listener.clone());

    assert_eq!(
        listener.events(),
        vec![
            Recorded::Child(ChangeEvent::Added { index: 0 }),
            Recorded::Child(ChangeEvent::Added { index: 1 }),
            Recorded::DataChanged,
        ]
    );
}

#[test]
fn checkpoints_reach_every_listener() {
    let (source, array) = local_pair();
    let first = RecordingListener::new();
    let second = RecordingListener::new();
    array.add_change_listener(first.clone());
    array.add_change_listener(second.clone());

    source.checkpoint();

    assert_eq!(first.data_changed_count(), 2);
    assert_eq!(second.data_changed_count(), 1);
}

#[test]
fn listeners_are_notified_in_registration_order() {
    struct Ordered {
        id: usize,
        log: Arc<std::sync::Mutex<Vec<usize>>>,
    }
    impl ChangeEventListener for Ordered {
        fn on_child_changed(&self, _event: ChangeEvent) {
            self.log.lock().unwrap().push(self.id);
        }
        fn on_data_changed(&self) {}
        fn on_cancelled(&self, _cancellation: &Cancellation) {}
    }

    let (source, array) = local_pair();
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    for id in 0..3 {
        array.add_change_listener(Arc::new(Ordered {
            id,
            log: log.clone(),
        }));
    }

    source.push_child(snap("a", "a")).unwrap();

    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn cancellation_is_forwarded_to_every_listener() {
    let (source, array) = local_pair_with(&["a"]);
    let first = RecordingListener::new();
    let second = RecordingListener::new();
    array.add_change_listener(first.clone());
    array.add_change_listener(second.clone());

    let error = RemoteError::new(-3, "permission denied").with_details("rules rejected read");
    source.cancel(error.clone());

    assert_eq!(first.cancellations(), vec![Cancellation::Remote(error.clone())]);
    assert_eq!(second.cancellations(), vec![Cancellation::Remote(error)]);
    // no internal retry or reset
    assert!(array.is_listening());
    assert_keys!(array, ["a"]);
}

#[test]
fn subscription_listeners_hear_every_registration() {
    let (_source, array) = local_pair();
    let subscriber = CountingSubscriber::new();
    let subscriber_handle = array.add_subscription_listener(subscriber.clone());

    let first = array.add_change_listener(RecordingListener::new());
    let second = array.add_change_listener(RecordingListener::new());
    assert_eq!(subscriber.added(), 2);

    array.remove_change_listener(&first).unwrap();
    array.remove_change_listener(&second).unwrap();
    assert_eq!(subscriber.removed(), 2);

    array.remove_subscription_listener(&subscriber_handle).unwrap();
    array.add_change_listener(RecordingListener::new());
    assert_eq!(subscriber.added(), 2);
}

#[test]
fn removing_unregistered_listener_is_invalid_argument() {
    let (source, array) = local_pair_with(&["a"]);
    let subscriber = CountingSubscriber::new();
    array.add_subscription_listener(subscriber.clone());
    array.add_change_listener(RecordingListener::new());

    let stranger: Arc<dyn ChangeEventListener> = RecordingListener::new();
    let result = array.remove_change_listener(&stranger);

    assert!(matches!(result, Err(SyncError::InvalidArgument { .. })));
    // subscription listeners hear about every removal call
    assert_eq!(subscriber.removed(), 1);
    assert!(array.is_listening());
    assert_keys!(array, ["a"]);
    assert_eq!(source.child_subscriptions(), (1, 0));

    let stranger_subscriber: Arc<dyn SubscriptionEventListener> = CountingSubscriber::new();
    assert!(matches!(
        array.remove_subscription_listener(&stranger_subscriber),
        Err(SyncError::InvalidArgument { .. })
    ));
}

#[test]
fn same_listener_registered_twice_counts_twice() {
    let (source, array) = local_pair();
    let listener = RecordingListener::new();
    let handle = array.add_change_listener(listener.clone());
    array.add_change_listener(listener.clone());
    assert_eq!(array.listener_count(), 2);

    source.push_child(snap("a", "a")).unwrap();
    assert_eq!(listener.child_events().len(), 2);

    array.remove_change_listener(&handle).unwrap();
    assert!(array.is_listening());
    array.remove_change_listener(&handle).unwrap();
    assert!(!array.is_listening());
}

#[test]
fn suppressed_notifications_still_mutate() {
    let (source, array) = local_pair();
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());
    listener.clear();

    array.set_notify_listeners(false);
    assert!(!array.notifies_listeners());
    source.push_child(snap("a", "a")).unwrap();
    source.push_child(snap("b", "b")).unwrap();
    source.checkpoint();
    assert!(listener.events().is_empty());
    assert_keys!(array, ["a", "b"]);

    array.set_notify_listeners(true);
    source.remove_child("a").unwrap();
    assert_child_events!(listener, [ChangeEvent::Removed { index: 0 }]);
}

#[test]
fn listeners_can_read_engine_during_notification() {
    let (source, array) = local_pair();
    let reader = ReadBackListener::new(&array);
    array.add_change_listener(reader.clone());

    source.push_child(snap("a", "a")).unwrap();
    source.push_child(snap("b", "b")).unwrap();
    source.move_child("b", 0).unwrap();

    assert_eq!(
        reader.seen(),
        vec![
            vec!["a".to_string()],
            vec!["a".to_string(), "b".to_string()],
            vec!["b".to_string(), "a".to_string()],
        ]
    );
}

#[test]
fn snapshots_view_is_read_only() {
    let (_source, array) = local_pair_with(&["a", "b"]);
    array.add_change_listener(RecordingListener::new());

    let mut view = array.snapshots();
    assert_eq!(view.len(), 2);
    assert_eq!(view.get(0).map(|s| s.value().as_str()), Some("a"));
    assert!(matches!(
        view.push(snap("c", "c")),
        Err(SyncError::UnsupportedMutation { .. })
    ));
    assert!(matches!(view.clear(), Err(SyncError::UnsupportedMutation { .. })));
    assert_eq!(view.len(), 2);
    drop(view);

    assert_eq!(array.index_of_key("b"), Some(1));
    assert_eq!(array.index_of_key("z"), None);
}

#[test]
fn engine_can_be_driven_directly_while_listening() {
    let source = Arc::new(LocalSource::<TestSnapshot>::new());
    let array = SyncArray::<TestSnapshot>::new(source);
    let listener = RecordingListener::new();
    array.add_change_listener(listener.clone());
    listener.clear();

    let change = array.apply(ChildEvent::added(snap("a", "a"), None)).unwrap();

    assert_eq!(change, ChangeEvent::Added { index: 0 });
    assert_child_events!(listener, [ChangeEvent::Added { index: 0 }]);
}

#[test]
fn idle_engine_rejects_direct_events() {
    let (source, array) = local_pair_with(&["a"]);

    let result = array.apply(ChildEvent::added(snap("zz", "zz"), None));
    array.apply_value_event(ValueEvent::DataChange);

    assert_eq!(result, Err(SyncError::NotListening));
    assert!(array.is_empty());
    assert!(!array.is_listening());

    // a later subscription starts from the source alone
    array.add_change_listener(RecordingListener::new());
    assert_eq!(array.keys(), source.keys());
}

#[test]
fn delivery_in_flight_when_last_listener_leaves_is_dropped() {
    let source = Arc::new(LocalSource::<GatedSnapshot>::new());
    let array = SyncArray::<GatedSnapshot>::new(source.clone());
    let handle = array.add_change_listener(RecordingListener::new());
    let gate = Gate::new();

    let delivery = {
        let source = source.clone();
        let snapshot = GatedSnapshot::gated("late", gate.clone());
        std::thread::spawn(move || source.deliver(ChildEvent::added(snapshot, None)))
    };
    gate.wait_entered();
    array.remove_change_listener(&handle).unwrap();
    assert!(array.is_empty());

    gate.release();

    assert_eq!(delivery.join().unwrap(), Ok(()));
    assert!(array.is_empty());
    assert!(!array.is_listening());
}

#[test]
fn delivery_in_flight_from_a_closed_subscription_skips_the_new_one() {
    let source = Arc::new(LocalSource::<GatedSnapshot>::new());
    let array = SyncArray::<GatedSnapshot>::new(source.clone());
    let handle = array.add_change_listener(RecordingListener::new());
    let gate = Gate::new();

    let delivery = {
        let source = source.clone();
        let snapshot = GatedSnapshot::gated("late", gate.clone());
        std::thread::spawn(move || source.deliver(ChildEvent::added(snapshot, None)))
    };
    gate.wait_entered();
    array.remove_change_listener(&handle).unwrap();
    let fresh = RecordingListener::new();
    array.add_change_listener(fresh.clone());
    source.deliver(ChildEvent::added(GatedSnapshot::open("current"), None)).unwrap();

    gate.release();

    assert_eq!(delivery.join().unwrap(), Ok(()));
    assert_keys!(array, ["current"]);
    assert_child_events!(fresh, [ChangeEvent::Added { index: 0 }]);
}

#[test]
fn registration_from_another_thread_during_delivery() {
    let (source, array) = local_pair();
    let anchor = RecordingListener::new();
    array.add_change_listener(anchor.clone());

    let registrar = {
        let array = array.clone();
        std::thread::spawn(move || {
            for _ in 0..200 {
                let extra = array.add_change_listener(RecordingListener::new());
                array.remove_change_listener(&extra).unwrap();
            }
        })
    };

    for i in 0..200 {
        source.push_child(snap(&format!("k{}", i), "v")).unwrap();
    }
    registrar.join().unwrap();

    assert_eq!(array.keys(), source.keys());
    assert_eq!(anchor.child_events().len(), 200);
    assert_eq!(array.listener_count(), 1);
}
