use braincache_core::model::entity::{EntityKind, EntityRef};
use braincache_core::{DomainEvent, EventBus, RepoId, Uid};
use parking_lot::Mutex;
use std::sync::Arc;

fn changed(raw: i64) -> DomainEvent {
    DomainEvent::EntityChanged(EntityRef::new(EntityKind::File, Uid::from_raw(raw)))
}

#[test]
fn delivers_synchronously_in_subscription_order() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first_seen = Arc::clone(&seen);
    let _first = bus.subscribe(move |_| first_seen.lock().push("first"));
    let second_seen = Arc::clone(&seen);
    let _second = bus.subscribe(move |_| second_seen.lock().push("second"));

    bus.publish(DomainEvent::RepositoryReady(RepoId::Files));
    assert_eq!(*seen.lock(), vec!["first", "second"]);
}

#[test]
fn unsubscribe_is_idempotent() {
    let bus = EventBus::new();
    let count = Arc::new(Mutex::new(0));
    let handler_count = Arc::clone(&count);
    let subscription = bus.subscribe(move |_| *handler_count.lock() += 1);

    bus.publish(changed(1));
    subscription.unsubscribe();
    subscription.unsubscribe();
    bus.publish(changed(2));

    assert_eq!(*count.lock(), 1);
    assert!(!subscription.is_active());
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn handler_may_publish_reentrantly() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let inner_bus = bus.clone();
    let _relay = bus.subscribe(move |event| {
        if let DomainEvent::EntityChanged(entity) = event {
            inner_bus.publish(DomainEvent::RepositoryFlushed(match entity.kind {
                EntityKind::File => RepoId::Files,
                EntityKind::Folder => RepoId::Folders,
            }));
        }
    });
    let recorder_seen = Arc::clone(&seen);
    let _recorder = bus.subscribe(move |event| recorder_seen.lock().push(*event));

    bus.publish(changed(7));

    assert_eq!(
        *seen.lock(),
        vec![DomainEvent::RepositoryFlushed(RepoId::Files), changed(7)]
    );
}

#[test]
fn subscriber_added_during_delivery_sees_only_later_events() {
    let bus = EventBus::new();
    let late_count = Arc::new(Mutex::new(0));
    let late_subscription = Arc::new(Mutex::new(None));

    let registering_bus = bus.clone();
    let registering_count = Arc::clone(&late_count);
    let registering_slot = Arc::clone(&late_subscription);
    let _registrar = bus.subscribe(move |_| {
        let mut slot = registering_slot.lock();
        if slot.is_none() {
            let count = Arc::clone(&registering_count);
            *slot = Some(registering_bus.subscribe(move |_| *count.lock() += 1));
        }
    });

    bus.publish(changed(1));
    assert_eq!(*late_count.lock(), 0);
    bus.publish(changed(2));
    assert_eq!(*late_count.lock(), 1);
}
