//! Shared test models and helpers for tracker tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::{Arc, OnceLock};
use trackable_core::{Entity, EntityType, StructuralClone, TrackedEntity, TrackerResult};

/// Installs a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Entity types ─────────────────────────────────────────────────

pub fn address_type() -> EntityType {
    static TYPE: OnceLock<EntityType> = OnceLock::new();
    TYPE.get_or_init(|| {
        EntityType::builder("Address")
            .text("street")
            .text("city")
            .build()
            .expect("valid address type")
    })
    .clone()
}

/// A user with one property of every kind.
pub fn user_type() -> EntityType {
    static TYPE: OnceLock<EntityType> = OnceLock::new();
    TYPE.get_or_init(|| {
        EntityType::builder("User")
            .text("name")
            .scalar("age")
            .scalar("pair")
            .array("scores")
            .value_collection("tags")
            .object("position")
            .reference("address", "Address")
            .reference("manager", "User")
            .entity_collection("friends", "User")
            .unmapped("session")
            .scalar("row_version")
            .build()
            .expect("valid user type")
    })
    .clone()
}

pub fn order_type() -> EntityType {
    static TYPE: OnceLock<EntityType> = OnceLock::new();
    TYPE.get_or_init(|| {
        EntityType::builder("Order")
            .text("number")
            .reference("customer", "User")
            .entity_collection("lines", "OrderLine")
            .build()
            .expect("valid order type")
    })
    .clone()
}

pub fn order_line_type() -> EntityType {
    static TYPE: OnceLock<EntityType> = OnceLock::new();
    TYPE.get_or_init(|| {
        EntityType::builder("OrderLine")
            .text("sku")
            .scalar("quantity")
            .reference("order", "Order")
            .build()
            .expect("valid order line type")
    })
    .clone()
}

// ── Builders ─────────────────────────────────────────────────────

pub fn user(name: &str, age: i32) -> Entity {
    let user = Entity::new(user_type());
    user.set("name", name).expect("set name");
    user.set("age", age).expect("set age");
    user
}

pub fn address(street: &str, city: &str) -> Entity {
    let address = Entity::new(address_type());
    address.set("street", street).expect("set street");
    address.set("city", city).expect("set city");
    address
}

/// An order with `lines` lines, each linking back to the order.
pub fn order(number: &str, lines: usize) -> TrackerResult<Entity> {
    let order = Entity::new(order_type());
    order.set("number", number)?;
    order.init_collections()?;
    let collection = order.get_as::<trackable_core::EntityCollection>("lines")?;
    for i in 0..lines {
        let line = Entity::new(order_line_type());
        line.set("sku", format!("SKU-{i}"))?;
        line.set("quantity", 1)?;
        line.set("order", &order)?;
        collection.push(line)?;
    }
    Ok(order)
}

// ── Typed wrapper ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct User(Entity);

impl TrackedEntity for User {
    fn entity_type() -> EntityType {
        user_type()
    }

    fn from_entity(entity: Entity) -> Self {
        Self(entity)
    }

    fn entity(&self) -> &Entity {
        &self.0
    }
}

impl User {
    pub fn name(&self) -> Option<String> {
        self.0.get_as("name").expect("declared property")
    }
}

// ── Object payload ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl StructuralClone for Point {
    fn structural_clone(&self) -> Arc<dyn StructuralClone> {
        Arc::new(self.clone())
    }

    fn structural_eq(&self, other: &dyn StructuralClone) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
