mod common;

use common::{init_tracing, user};
use pretty_assertions::assert_eq;
use trackable_core::{EntityState, Monitor, MonitorConfig, TrackerError};

#[test]
fn defaults() {
    let config = MonitorConfig::default();
    assert!(config.excluded_properties.is_empty());
    assert!(config.dispose_removed_new);
    assert!(config.restore_collection_membership);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = MonitorConfig::from_toml_str("").expect("parse");
    assert_eq!(config, MonitorConfig::default());
}

#[test]
fn partial_toml_overrides_only_given_fields() {
    let config = MonitorConfig::from_toml_str(
        r#"
        excluded_properties = ["row_version", "session"]
        dispose_removed_new = false
        "#,
    )
    .expect("parse");

    assert_eq!(
        config.excluded_properties,
        vec!["row_version".to_string(), "session".to_string()]
    );
    assert!(!config.dispose_removed_new);
    assert!(config.restore_collection_membership);
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = MonitorConfig::from_toml_str("dispose_removed_new = \"yes\"").unwrap_err();
    assert!(matches!(err, TrackerError::Config(_)));
}

#[test]
fn toml_config_drives_the_monitor() {
    init_tracing();
    let config = MonitorConfig::from_toml_str(r#"excluded_properties = ["age"]"#).expect("parse");
    let monitor = Monitor::with_config(config);
    let user = user("Ann", 33);
    monitor.apply(&user).expect("apply");

    user.set("age", 99).expect("set");
    assert_eq!(user.state(), EntityState::Unmodified);
    assert_eq!(monitor.original_value(&user, "age").expect("tracked"), None);
    assert!(monitor.config().excluded_properties.contains(&"age".to_string()));
}
