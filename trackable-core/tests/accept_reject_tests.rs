mod common;

use common::{Point, address, init_tracing, user};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use trackable_core::{
    Entity, EntityCollection, EntityState, Monitor, MonitorConfig, Value, ValueCollection,
};

/// Owner with two friends, applied as a graph.
fn tracked_graph(config: MonitorConfig) -> (Monitor, Entity, EntityCollection, Vec<Entity>) {
    init_tracing();
    let owner = user("Owner", 50);
    owner.init_collections().expect("init");
    let friends: EntityCollection = owner.get_as("friends").expect("friends");
    let members = vec![user("First", 1), user("Second", 2)];
    friends.extend(members.clone()).expect("extend");

    let monitor = Monitor::with_config(config);
    monitor.apply_graph(&owner).expect("apply graph");
    (monitor, owner, friends, members)
}

// ── Accept ───────────────────────────────────────────────────────

#[test]
fn accept_rebaselines_modified_entities() {
    let (monitor, owner, _, _) = tracked_graph(MonitorConfig::default());
    owner.set("age", 40).expect("set");
    monitor.accept_changes();

    assert_eq!(owner.state(), EntityState::Unmodified);
    assert!(!monitor.is_changed());
    assert_eq!(owner.get_original_property::<i32>("age").expect("tracked"), Some(40));

    owner.set("age", 50).expect("set");
    assert_eq!(owner.state(), EntityState::Modified);
}

#[test]
fn accept_makes_new_entities_unmodified() {
    let (monitor, _, friends, _) = tracked_graph(MonitorConfig::default());
    let newcomer = user("Third", 3);
    friends.push(newcomer.clone()).expect("push");
    assert_eq!(newcomer.state(), EntityState::New);

    monitor.accept_changes();
    assert_eq!(newcomer.state(), EntityState::Unmodified);
    assert!(monitor.get_added_items().is_empty());
    assert!(monitor.contains(&newcomer));
}

#[test]
fn accept_untracks_deleted_entities() {
    let (monitor, _, friends, members) = tracked_graph(MonitorConfig::default());
    friends.remove(&members[0]);
    assert_eq!(members[0].state(), EntityState::Deleted);

    monitor.accept_changes();
    assert_eq!(members[0].state(), EntityState::Detached);
    assert!(!monitor.contains(&members[0]));
    assert!(!monitor.is_changed());

    // The accepted membership is the new baseline.
    monitor.reject_changes();
    assert_eq!(friends.len(), 1);
    assert!(!friends.contains(&members[0]));
}

#[test]
fn accept_with_no_changes_is_a_no_op() {
    let (monitor, owner, friends, _) = tracked_graph(MonitorConfig::default());
    let before = monitor.len();
    monitor.accept_changes();
    assert_eq!(monitor.len(), before);
    assert_eq!(owner.state(), EntityState::Unmodified);
    assert_eq!(friends.len(), 2);
}

// ── Reject ───────────────────────────────────────────────────────

#[test]
fn reject_restores_modified_properties() {
    let (monitor, owner, _, _) = tracked_graph(MonitorConfig::default());
    let home = address("Main St", "Springfield");
    owner.set("age", 40).expect("set");
    owner.set("name", "Changed").expect("set");
    owner.set("scores", vec![9]).expect("set");
    owner.set("position", Value::object(Point { x: 3, y: 4 })).expect("set");
    owner.set("address", &home).expect("set");

    monitor.reject_changes();

    assert_eq!(owner.state(), EntityState::Unmodified);
    assert!(owner.changed_properties().is_empty());
    assert_eq!(owner.get_as::<i32>("age").expect("age"), 50);
    assert_eq!(owner.get_as::<String>("name").expect("name"), "Owner");
    assert_eq!(owner.get("scores").expect("scores"), Value::Null);
    assert_eq!(owner.get("position").expect("position"), Value::Null);
    assert_eq!(owner.get("address").expect("address"), Value::Null);
    assert!(!monitor.is_changed());
}

#[test]
fn reject_notifies_restored_properties() {
    let (monitor, owner, _, _) = tracked_graph(MonitorConfig::default());
    owner.set("age", 40).expect("set");
    owner.set("name", "Changed").expect("set");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    owner.subscribe(move |event| sink.lock().push(event.property.clone()));

    monitor.reject_changes();
    assert_eq!(*seen.lock(), vec!["name".to_string(), "age".to_string()]);
}

#[test]
fn reject_drops_and_disposes_new_entities() {
    let (monitor, _, friends, members) = tracked_graph(MonitorConfig::default());
    let newcomer = user("Third", 3);
    friends.push(newcomer.clone()).expect("push");

    monitor.reject_changes();

    assert!(newcomer.is_disposed());
    assert_eq!(newcomer.state(), EntityState::Detached);
    assert!(!monitor.contains(&newcomer));
    assert_eq!(friends.to_vec(), members);
}

#[test]
fn reject_restores_deleted_entities_and_membership() {
    let (monitor, _, friends, members) = tracked_graph(MonitorConfig::default());
    members[0].set("age", 77).expect("set");
    friends.remove(&members[0]);
    assert_eq!(members[0].state(), EntityState::Deleted);

    monitor.reject_changes();

    assert_eq!(members[0].state(), EntityState::Unmodified);
    assert_eq!(members[0].get_as::<i32>("age").expect("age"), 1);
    assert_eq!(friends.to_vec(), members);
    assert!(!monitor.is_changed());
}

#[test]
fn reject_without_membership_restore_keeps_collection_as_is() {
    let config = MonitorConfig {
        restore_collection_membership: false,
        ..MonitorConfig::default()
    };
    let (monitor, _, friends, members) = tracked_graph(config);
    friends.remove(&members[0]);

    monitor.reject_changes();

    assert_eq!(members[0].state(), EntityState::Unmodified);
    assert_eq!(friends.to_vec(), vec![members[1].clone()]);
}

#[test]
fn reject_restores_value_collection_in_place() {
    init_tracing();
    let owner = user("Owner", 50);
    let tags = ValueCollection::from_iter(["a", "b"]);
    owner.set("tags", tags.clone()).expect("set");
    let monitor = Monitor::new();
    monitor.apply(&owner).expect("apply");

    tags.push("c");
    tags.remove_at(0);
    monitor.reject_changes();

    assert_eq!(tags.items(), vec!["a".into(), "b".into()]);
    assert_eq!(owner.state(), EntityState::Unmodified);

    // Still bound: a new mutation is seen again.
    tags.push("d");
    assert_eq!(owner.state(), EntityState::Modified);
}

#[test]
fn reject_restores_a_replaced_value_collection() {
    init_tracing();
    let owner = user("Owner", 50);
    owner.set("tags", ValueCollection::from_iter(["a"])).expect("set");
    let monitor = Monitor::new();
    monitor.apply(&owner).expect("apply");

    owner.set("tags", ValueCollection::from_iter(["z"])).expect("set");
    monitor.reject_changes();

    let tags: ValueCollection = owner.get_as("tags").expect("tags");
    assert_eq!(tags.items(), vec!["a".into()]);
    let (bound_to, property) = tags.owner().expect("bound");
    assert_eq!(bound_to, owner);
    assert_eq!(property, "tags");
}

#[test]
fn accept_and_reject_report_the_is_changed_transition() {
    let (monitor, owner, _, _) = tracked_graph(MonitorConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    monitor.subscribe_is_changed(move |value| sink.lock().push(value));

    owner.set("age", 1).expect("set");
    monitor.accept_changes();
    owner.set("age", 2).expect("set");
    monitor.reject_changes();
    monitor.reject_changes();

    assert_eq!(*seen.lock(), vec![true, false, true, false]);
}
