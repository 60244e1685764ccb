mod common;

use common::{address, init_tracing, order, user};
use pretty_assertions::assert_eq;
use trackable_core::{Entity, EntityCollection, EntityState, Monitor, Node, NodeId, TrackerError};

// ── apply_graph ──────────────────────────────────────────────────

#[test]
fn apply_graph_tracks_every_reachable_entity() {
    init_tracing();
    let order = order("A-1", 3).expect("order");
    let monitor = Monitor::new();
    monitor.apply_graph(&order).expect("apply graph");

    assert_eq!(monitor.len(), 4);
    let lines: EntityCollection = order.get_as("lines").expect("lines");
    assert_eq!(lines.monitor(), Some(monitor.clone()));
    for line in &lines {
        assert_eq!(line.state(), EntityState::Unmodified);
        assert_eq!(line.monitor(), Some(monitor.clone()));
    }
}

#[test]
fn apply_graph_from_a_collection_root() {
    init_tracing();
    let members = EntityCollection::from_items(vec![user("A", 1), user("B", 2)]);
    let monitor = Monitor::new();
    monitor.apply_graph(&members).expect("apply graph");

    assert_eq!(monitor.len(), 2);
    assert_eq!(members.monitor(), Some(monitor.clone()));

    members.push(user("C", 3)).expect("push");
    assert_eq!(monitor.get_added_items().len(), 1);
}

#[test]
fn apply_graph_skips_already_tracked_subtrees() {
    init_tracing();
    let home = address("Main St", "Springfield");
    let owner = user("Owner", 1);
    owner.set("address", &home).expect("set");

    let monitor = Monitor::new();
    monitor.apply(&owner).expect("apply");
    monitor.apply_graph(&owner).expect("apply graph");

    // The root was already tracked, so its subtree was not walked.
    assert!(!monitor.contains(&home));
    assert_eq!(monitor.len(), 1);
}

#[test]
fn apply_graph_terminates_on_cycles() {
    init_tracing();
    let (a, b) = (user("A", 1), user("B", 2));
    a.set("manager", &b).expect("set");
    b.set("manager", &a).expect("set");

    let monitor = Monitor::new();
    monitor.apply_graph(&a).expect("apply graph");
    assert_eq!(monitor.len(), 2);
}

#[test]
fn apply_graph_fails_on_an_entity_of_another_monitor() {
    init_tracing();
    let (owner, boss) = (user("Owner", 1), user("Boss", 2));
    owner.set("manager", &boss).expect("set");
    let other = Monitor::new();
    other.apply(&boss).expect("apply");

    let monitor = Monitor::new();
    let result = monitor.apply_graph(&owner);
    assert!(matches!(result, Err(TrackerError::AlreadyTracked { entity }) if entity == boss.id()));
    // Entities applied before the failure stay tracked.
    assert!(monitor.contains(&owner));
    assert_eq!(owner.state(), EntityState::Unmodified);
    assert!(!monitor.contains(&boss));
    assert_eq!(boss.monitor(), Some(other));
    assert_eq!(monitor.len(), 1);
}

#[test]
fn disposing_a_cyclic_root_releases_its_links() {
    init_tracing();
    let order = order("A-7", 2).expect("order");
    let lines: EntityCollection = order.get_as("lines").expect("lines");
    let monitor = Monitor::new();
    monitor.apply_graph(&order).expect("apply graph");

    order.dispose();
    assert_eq!(order.get("lines").expect("lines"), trackable_core::Value::Null);
    assert!(!monitor.contains(&order));
    assert_eq!(lines.len(), 2);
}

#[test]
fn trackable_graph_tracks_the_whole_graph() {
    init_tracing();
    let order = order("A-2", 2).expect("order");
    let monitor = order.trackable_graph().expect("trackable graph");
    assert_eq!(monitor.len(), 3);
    assert_eq!(order.monitor(), Some(monitor));
}

// ── traverse_graph ───────────────────────────────────────────────

#[test]
fn traversal_is_depth_first_with_references_before_collections() {
    init_tracing();
    let customer = user("Customer", 40);
    let order = order("A-3", 2).expect("order");
    order.set("customer", &customer).expect("set");
    let lines: EntityCollection = order.get_as("lines").expect("lines");
    let line_ids: Vec<NodeId> = lines.iter().map(|l| NodeId::Entity(l.id())).collect();

    let monitor = Monitor::new();
    let mut visited = Vec::new();
    monitor.traverse_graph(&order, |node| {
        visited.push(node.id());
        true
    });

    assert_eq!(
        visited,
        vec![
            NodeId::Entity(order.id()),
            NodeId::Entity(customer.id()),
            NodeId::Collection(lines.id()),
            line_ids[0],
            line_ids[1],
        ]
    );
}

#[test]
fn traversal_visits_shared_nodes_once() {
    init_tracing();
    let shared = address("Main St", "Springfield");
    let (a, b) = (user("A", 1), user("B", 2));
    a.set("address", &shared).expect("set");
    b.set("address", &shared).expect("set");
    let members = EntityCollection::from_items(vec![a, b]);

    let monitor = Monitor::new();
    let mut count = 0;
    monitor.traverse_graph(&members, |node| {
        if node.as_entity().is_some_and(|e| e.ptr_eq(&shared)) {
            count += 1;
        }
        true
    });
    assert_eq!(count, 1);
}

#[test]
fn returning_false_prunes_the_subtree() {
    init_tracing();
    let order = order("A-4", 3).expect("order");
    let monitor = Monitor::new();
    let mut visited = 0;
    monitor.traverse_graph(&order, |node| {
        visited += 1;
        !matches!(node, Node::Collection(_))
    });
    // The order and its collection; no lines.
    assert_eq!(visited, 2);
}

// ── Reachable queries ────────────────────────────────────────────

#[test]
fn reachable_queries_filter_by_state() {
    init_tracing();
    let order = order("A-5", 3).expect("order");
    let monitor = Monitor::new();
    monitor.apply_graph(&order).expect("apply graph");
    let lines: EntityCollection = order.get_as("lines").expect("lines");
    let first = lines.get(0).expect("line");
    let second = lines.get(1).expect("line");

    first.set("quantity", 5).expect("set");
    lines.remove(&second);
    let added = Entity::new(common::order_line_type());
    lines.push(added.clone()).expect("push");

    assert_eq!(monitor.changed_from(&order), vec![first]);
    assert_eq!(monitor.added_from(&order), vec![added]);
    // Removed entities are no longer reachable from the order.
    assert!(monitor.deleted_from(&order).is_empty());
    assert_eq!(monitor.deleted_from(&second), vec![second.clone()]);

    let all = monitor.reachable_from(&order, |_| true);
    assert_eq!(all.len(), 4);
}

#[test]
fn clear_all_collections_from_clears_nested_collections() {
    init_tracing();
    let order = order("A-6", 2).expect("order");
    let monitor = Monitor::new();
    monitor.apply_graph(&order).expect("apply graph");
    let lines: EntityCollection = order.get_as("lines").expect("lines");
    let members = lines.to_vec();

    monitor.clear_all_collections_from(&order);

    assert!(lines.is_empty());
    assert!(members.iter().all(|l| l.state() == EntityState::Deleted));
    assert_eq!(monitor.get_deleted_items().len(), 2);
    assert_eq!(order.state(), EntityState::Unmodified);
}
