//! Property-based tests for the tracking invariants.
//!
//! Random sequences of writes and collection edits are run against a
//! tracked graph, checking after every step that:
//! - the monitor's `is_changed` flag equals "some tracked entity is dirty"
//! - an unmodified or modified entity is modified exactly when it has
//!   changed properties
//!
//! and that `reject_changes` / `accept_changes` bring the graph back to a
//! clean state.

mod common;

use common::user;
use proptest::prelude::*;
use std::collections::HashSet;
use trackable_core::{Entity, EntityCollection, EntityState, Monitor, NodeId, ValueCollection};

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

#[derive(Debug, Clone)]
enum Edit {
    SetAge { target: usize, age: i32 },
    SetName { target: usize, name: String },
    PushTag { target: usize, tag: String },
    AddFriend { age: i32 },
    RemoveFriend { index: usize },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..8, 0i32..4).prop_map(|(target, age)| Edit::SetAge { target, age }),
        (0usize..8, "[ab]").prop_map(|(target, name)| Edit::SetName { target, name }),
        (0usize..8, "[xy]").prop_map(|(target, tag)| Edit::PushTag { target, tag }),
        (0i32..4).prop_map(|age| Edit::AddFriend { age }),
        (0usize..8).prop_map(|index| Edit::RemoveFriend { index }),
    ]
}

struct Fixture {
    monitor: Monitor,
    owner: Entity,
    friends: EntityCollection,
    members: Vec<Entity>,
}

fn fixture() -> Fixture {
    let owner = user("a", 0);
    owner.init_collections().expect("init");
    let friends: EntityCollection = owner.get_as("friends").expect("friends");
    let members = vec![user("a", 1), user("b", 2), user("a", 3)];
    friends.extend(members.clone()).expect("extend");
    let monitor = Monitor::new();
    monitor.apply_graph(&owner).expect("apply graph");
    Fixture {
        monitor,
        owner,
        friends,
        members,
    }
}

fn apply_edit(fixture: &Fixture, edit: &Edit) {
    let mut targets = vec![fixture.owner.clone()];
    targets.extend(fixture.friends.to_vec());
    let pick = |i: usize| &targets[i % targets.len()];

    match edit {
        Edit::SetAge { target, age } => pick(*target).set("age", *age).expect("set age"),
        Edit::SetName { target, name } => {
            pick(*target).set("name", name.as_str()).expect("set name");
        }
        Edit::PushTag { target, tag } => {
            let entity = pick(*target);
            let tags = match entity.get_as::<Option<ValueCollection>>("tags").expect("tags") {
                Some(tags) => tags,
                None => {
                    let tags = ValueCollection::new();
                    entity.set("tags", tags.clone()).expect("set tags");
                    tags
                }
            };
            tags.push(tag.as_str());
        }
        Edit::AddFriend { age } => fixture.friends.push(user("n", *age)).expect("push"),
        Edit::RemoveFriend { index } => {
            if !fixture.friends.is_empty() {
                fixture.friends.remove_at(index % fixture.friends.len());
            }
        }
    }
}

fn assert_consistent(monitor: &Monitor) -> Result<(), TestCaseError> {
    let tracked = monitor.tracked_entities();
    let dirty = tracked
        .iter()
        .any(|e| e.state() != EntityState::Unmodified);
    prop_assert_eq!(monitor.is_changed(), dirty);

    for entity in &tracked {
        match entity.state() {
            EntityState::Unmodified => prop_assert!(entity.changed_properties().is_empty()),
            EntityState::Modified => prop_assert!(!entity.changed_properties().is_empty()),
            _ => {}
        }
    }
    Ok(())
}

// =============================================================================
// CHANGE TRACKING PROPERTY TESTS
// =============================================================================

mod tracking_properties {
    use super::*;

    proptest! {
        /// The aggregate flag always agrees with the per-entity states.
        #[test]
        fn is_changed_tracks_dirty_entities(edits in prop::collection::vec(edit_strategy(), 0..24)) {
            let fixture = fixture();
            for edit in &edits {
                apply_edit(&fixture, edit);
                assert_consistent(&fixture.monitor)?;
            }
        }

        /// Rejecting any edit sequence restores the tracked graph.
        #[test]
        fn reject_restores_the_original_graph(edits in prop::collection::vec(edit_strategy(), 0..24)) {
            let fixture = fixture();
            for edit in &edits {
                apply_edit(&fixture, edit);
            }

            fixture.monitor.reject_changes();

            prop_assert!(!fixture.monitor.is_changed());
            prop_assert_eq!(fixture.friends.to_vec(), fixture.members.clone());
            prop_assert_eq!(fixture.owner.get_as::<i32>("age").expect("age"), 0);
            prop_assert_eq!(fixture.owner.get_as::<String>("name").expect("name"), "a");
            for (member, age) in fixture.members.iter().zip(1..) {
                prop_assert_eq!(member.state(), EntityState::Unmodified);
                prop_assert_eq!(member.get_as::<i32>("age").expect("age"), age);
                prop_assert!(member.get("tags").expect("tags").is_null());
            }
            prop_assert_eq!(fixture.monitor.len(), 1 + fixture.members.len());
            assert_consistent(&fixture.monitor)?;
        }

        /// Accepting any edit sequence leaves every tracked entity clean
        /// and keeps the current values.
        #[test]
        fn accept_leaves_everything_clean(edits in prop::collection::vec(edit_strategy(), 0..24)) {
            let fixture = fixture();
            for edit in &edits {
                apply_edit(&fixture, edit);
            }
            let ages: Vec<i32> = fixture
                .friends
                .iter()
                .map(|f| f.get_as::<i32>("age").expect("age"))
                .collect();

            fixture.monitor.accept_changes();

            prop_assert!(!fixture.monitor.is_changed());
            for entity in fixture.monitor.tracked_entities() {
                prop_assert_eq!(entity.state(), EntityState::Unmodified);
                prop_assert!(entity.changed_properties().is_empty());
            }
            let after: Vec<i32> = fixture
                .friends
                .iter()
                .map(|f| f.get_as::<i32>("age").expect("age"))
                .collect();
            prop_assert_eq!(after, ages);
            prop_assert_eq!(fixture.monitor.len(), 1 + fixture.friends.len());
        }
    }
}

// =============================================================================
// TRAVERSAL PROPERTY TESTS
// =============================================================================

mod traversal_properties {
    use super::*;

    /// Random manager links and friend lists over a fixed set of users.
    fn graph_strategy() -> impl Strategy<Value = (usize, Vec<Option<usize>>, Vec<Vec<usize>>)> {
        (1usize..8).prop_flat_map(|n| {
            (
                Just(n),
                prop::collection::vec(prop::option::of(0..n), n),
                prop::collection::vec(prop::collection::vec(0..n, 0..4), n),
            )
        })
    }

    fn build(n: usize, managers: &[Option<usize>], friends: &[Vec<usize>]) -> Vec<Entity> {
        let users: Vec<Entity> = (0..n).map(|i| user("u", i32::try_from(i).unwrap_or(0))).collect();
        for (i, entity) in users.iter().enumerate() {
            if let Some(m) = managers[i] {
                entity.set("manager", &users[m]).expect("set manager");
            }
            let members = friends[i].iter().map(|&f| users[f].clone()).collect();
            entity
                .set("friends", EntityCollection::from_items(members))
                .expect("set friends");
        }
        users
    }

    proptest! {
        /// Every reachable node is visited exactly once, cycles included.
        #[test]
        fn traversal_visits_each_node_once((n, managers, friends) in graph_strategy()) {
            let users = build(n, &managers, &friends);
            let monitor = Monitor::new();
            let mut visited = Vec::new();
            monitor.traverse_graph(&users[0], |node| {
                visited.push(node.id());
                true
            });

            let unique: HashSet<NodeId> = visited.iter().copied().collect();
            prop_assert_eq!(unique.len(), visited.len());
            prop_assert_eq!(visited.first().copied(), Some(NodeId::Entity(users[0].id())));
        }

        /// Applying a graph tracks exactly the entities the walk reaches.
        #[test]
        fn apply_graph_tracks_the_reachable_set((n, managers, friends) in graph_strategy()) {
            let users = build(n, &managers, &friends);
            let monitor = Monitor::new();
            let mut reachable = HashSet::new();
            monitor.traverse_graph(&users[0], |node| {
                if let Some(entity) = node.as_entity() {
                    reachable.insert(entity.id());
                }
                true
            });

            monitor.apply_graph(&users[0]).expect("apply graph");
            let tracked: HashSet<_> = monitor.tracked_entities().iter().map(Entity::id).collect();
            prop_assert_eq!(tracked, reachable);
            prop_assert!(!monitor.is_changed());
        }
    }
}
