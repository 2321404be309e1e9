//! Tests for the broker topology

use std::time::{Duration, Instant};

use crate::{BrokerActivity, BrokerRecord, BrokerRegistry, CorrelateError, region_coordinates};

fn mesh() -> BrokerRegistry {
    BrokerRegistry::new([
        BrokerRecord::new("broker1", "us-east-1").with_connections(["broker2", "broker3"]),
        BrokerRecord::new("broker2", "eu-west-1").with_connections(["broker1"]),
        BrokerRecord::new("broker3", "ap-northeast-1").with_connections(["broker9"]),
    ])
    .unwrap()
}

// ============================================================================
// Region tests
// ============================================================================

#[test]
fn test_region_coordinates_known() {
    let coords = region_coordinates("eu-west-1").unwrap();
    assert_eq!(coords.location, "Ireland");
    assert!((coords.latitude - 53.33).abs() < f64::EPSILON);
}

#[test]
fn test_region_coordinates_unknown() {
    assert!(region_coordinates("mars-north-1").is_none());
}

// ============================================================================
// Registry tests
// ============================================================================

#[test]
fn test_resolve_broker() {
    let registry = mesh();

    let broker = registry.resolve_broker("broker2").unwrap();
    assert_eq!(broker.region, "eu-west-1");
    assert!(registry.resolve_broker("solclient-1").is_none());
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_iter_keeps_config_order() {
    let names: Vec<_> = mesh().iter().map(|b| b.name.clone()).collect();
    assert_eq!(names, vec!["broker1", "broker2", "broker3"]);
}

#[test]
fn test_duplicate_broker_rejected() {
    let result = BrokerRegistry::new([
        BrokerRecord::new("broker1", "us-east-1"),
        BrokerRecord::new("broker1", "us-west-2"),
    ]);

    assert!(matches!(result, Err(CorrelateError::DuplicateBroker { name }) if name == "broker1"));
}

#[test]
fn test_unknown_region_rejected() {
    let result = BrokerRegistry::new([BrokerRecord::new("broker1", "moon-1")]);
    assert!(matches!(result, Err(CorrelateError::UnknownRegion { .. })));
}

#[test]
fn test_links_are_deduplicated_and_skip_unknown() {
    let links = mesh().links();

    assert_eq!(
        links,
        vec![
            ("broker1".to_string(), "broker2".to_string()),
            ("broker1".to_string(), "broker3".to_string()),
        ]
    );
}

#[test]
fn test_broker_coordinates() {
    let registry = mesh();
    let coords = registry.resolve_broker("broker3").unwrap().coordinates().unwrap();
    assert_eq!(coords.location, "Tokyo, Japan");
}

// ============================================================================
// Activity tests
// ============================================================================

#[test]
fn test_heat_fades_linearly() {
    let t0 = Instant::now();
    let mut activity = BrokerActivity::new(Duration::from_millis(1000));
    activity.record("broker1", t0);

    assert!((activity.heat("broker1", t0) - 1.0).abs() < 1e-6);
    assert!((activity.heat("broker1", t0 + Duration::from_millis(250)) - 0.75).abs() < 1e-3);
    assert_eq!(activity.heat("broker1", t0 + Duration::from_millis(1000)), 0.0);
    assert_eq!(activity.heat("broker1", t0 + Duration::from_secs(5)), 0.0);
}

#[test]
fn test_heat_of_idle_broker_is_zero() {
    let activity = BrokerActivity::new(Duration::from_millis(1000));
    assert_eq!(activity.heat("broker1", Instant::now()), 0.0);
    assert!(activity.last_event("broker1").is_none());
}

#[test]
fn test_heat_resets_on_new_event() {
    let t0 = Instant::now();
    let mut activity = BrokerActivity::new(Duration::from_millis(1000));
    activity.record("broker1", t0);
    activity.record("broker1", t0 + Duration::from_millis(900));

    let heat = activity.heat("broker1", t0 + Duration::from_millis(1000));
    assert!((heat - 0.9).abs() < 1e-3);
}
