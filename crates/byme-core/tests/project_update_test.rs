#![allow(clippy::unwrap_used)]
// Integration tests for `Project::update` against a wiremock web server.

mod common;

use pretty_assertions::assert_eq;
use wiremock::MockServer;

use byme_core::{CoreError, DeviceField, OverrideRule, Platform, Project, RuleAction, RuleSet};
use common::{
    MEMBERSHIP, MEMBERSHIP_ROWS, REMOTE_DEVICES, REMOTE_ROWS, ROOM_ROWS, ROOMS, SINGLE_STATUS,
    logged_in_client, mount_login, mount_query,
};

async fn project(server: &MockServer, rules: RuleSet, ignore: Vec<Platform>) -> Project {
    let client = logged_in_client(server).await;
    Project::new(client, rules, ignore, Some("999".into()))
}

#[tokio::test]
async fn test_unchanged_count_skips_rooms_and_classification() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, REMOTE_DEVICES, REMOTE_ROWS, 2).await;
    mount_query(&server, ROOMS, ROOM_ROWS, 1).await;
    mount_query(&server, MEMBERSHIP, MEMBERSHIP_ROWS, 1).await;

    let project = project(&server, RuleSet::default(), Vec::new()).await;
    project.update(false).await.unwrap();
    let devices = project.update(false).await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(project.version(), 2);
}

#[tokio::test]
async fn test_forced_update_reruns_membership() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, REMOTE_DEVICES, REMOTE_ROWS, 2).await;
    // Rooms are cached for the session; membership is not.
    mount_query(&server, ROOMS, ROOM_ROWS, 1).await;
    mount_query(&server, MEMBERSHIP, MEMBERSHIP_ROWS, 2).await;

    let project = project(&server, RuleSet::default(), Vec::new()).await;
    project.update(false).await.unwrap();
    project.update(true).await.unwrap();
}

#[tokio::test]
async fn test_update_builds_classified_table() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, REMOTE_DEVICES, REMOTE_ROWS, 1).await;
    mount_query(&server, ROOMS, ROOM_ROWS, 1).await;
    mount_query(&server, MEMBERSHIP, MEMBERSHIP_ROWS, 1).await;

    let project = project(&server, RuleSet::default(), Vec::new()).await;
    let devices = project.update(false).await.unwrap();

    // The membership row for unknown id 99 must not create a record.
    assert_eq!(devices.len(), 2);

    let light = &devices["10"];
    assert_eq!(light.device_type, Platform::Light);
    assert_eq!(light.room_name, "Cucina");
    assert_eq!(light.device_friendly_name, "1 Cucina");
    assert_eq!(light.get_state("on/off"), Some("1"));

    let thermostat = &devices["11"];
    assert_eq!(thermostat.device_type, Platform::Climate);
    assert_eq!(thermostat.status.len(), 2);
    assert_eq!(
        thermostat.status["setpoint"].status_range.as_deref(),
        Some("min=5|max=35")
    );

    assert_eq!(project.type_exists(Platform::Light), Some(1));
    assert_eq!(project.type_exists(Platform::Cover), None);
    assert_eq!(project.get_by_type(Platform::Climate).len(), 1);
    assert_eq!(project.global_channel_id(), Some("999"));
    assert!(project.last_updated().is_some());
}

#[tokio::test]
async fn test_ignored_platforms_are_hidden() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, REMOTE_DEVICES, REMOTE_ROWS, 1).await;
    mount_query(&server, ROOMS, ROOM_ROWS, 1).await;
    mount_query(&server, MEMBERSHIP, MEMBERSHIP_ROWS, 1).await;

    let project = project(&server, RuleSet::default(), vec![Platform::Climate]).await;
    project.update(false).await.unwrap();

    assert_eq!(project.type_exists(Platform::Climate), None);
    assert!(project.get_by_type(Platform::Climate).is_empty());
    assert_eq!(project.device_count(), 2);
}

#[tokio::test]
async fn test_override_rules_win_over_classification() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, REMOTE_DEVICES, REMOTE_ROWS, 1).await;
    mount_query(&server, ROOMS, ROOM_ROWS, 1).await;
    mount_query(&server, MEMBERSHIP, MEMBERSHIP_ROWS, 1).await;

    let rules = RuleSet::compile(&[OverrideRule {
        filter: [(DeviceField::ObjectId, "^10$".to_owned())].into_iter().collect(),
        actions: vec![
            RuleAction::Set {
                field: DeviceField::DeviceType,
                value: "switch".into(),
            },
            RuleAction::Set {
                field: DeviceField::DeviceFriendlyName,
                value: "Lampada cucina".into(),
            },
        ],
    }])
    .unwrap();

    let project = project(&server, rules, Vec::new()).await;
    let devices = project.update(false).await.unwrap();

    assert_eq!(devices["10"].device_type, Platform::Switch);
    assert_eq!(devices["10"].device_friendly_name, "Lampada cucina");
    assert_eq!(project.type_exists(Platform::Light), None);
    assert_eq!(project.type_exists(Platform::Switch), Some(1));
}

#[tokio::test]
async fn test_forced_reclassify_does_not_compound_rewrites() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, REMOTE_DEVICES, REMOTE_ROWS, 3).await;
    mount_query(&server, ROOMS, ROOM_ROWS, 1).await;
    mount_query(&server, MEMBERSHIP, MEMBERSHIP_ROWS, 3).await;

    let rules = RuleSet::compile(&[OverrideRule {
        filter: [(DeviceField::ObjectId, "^10$".to_owned())].into_iter().collect(),
        actions: vec![RuleAction::Replace {
            field: DeviceField::DeviceFriendlyName,
            pattern: "Cucina".into(),
            replacement: "Cucina Nord".into(),
        }],
    }])
    .unwrap();

    let project = project(&server, rules, Vec::new()).await;
    for _ in 0..3 {
        let devices = project.update(true).await.unwrap();
        assert_eq!(devices["10"].object_name, "LUCE 1 CUCINA");
        assert_eq!(devices["10"].device_friendly_name, "1 Cucina Nord");
        assert_eq!(devices["10"].device_type, Platform::Light);
    }
}

#[tokio::test]
async fn test_refresh_device_merges_additively() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, REMOTE_DEVICES, REMOTE_ROWS, 1).await;
    mount_query(&server, ROOMS, ROOM_ROWS, 1).await;
    mount_query(&server, MEMBERSHIP, MEMBERSHIP_ROWS, 1).await;
    mount_query(
        &server,
        SINGLE_STATUS,
        "Row000001: 'status_id','status_name','status_value'\nRow000002: '111','setpoint','19.5'",
        1,
    )
    .await;

    let project = project(&server, RuleSet::default(), Vec::new()).await;
    project.update(false).await.unwrap();

    let device = project.refresh_device("11").await.unwrap();
    assert_eq!(device.get_state("setpoint"), Some("19.5"));
    assert_eq!(device.get_state("funzionamento"), Some("6"));
    assert_eq!(
        device.status["setpoint"].status_range.as_deref(),
        Some("min=5|max=35")
    );
    assert_eq!(project.device("11").unwrap().get_state("setpoint"), Some("19.5"));
}

#[tokio::test]
async fn test_refresh_unknown_device_fails_without_request() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_query(&server, SINGLE_STATUS, "", 0).await;

    let project = project(&server, RuleSet::default(), Vec::new()).await;
    let result = project.refresh_device("12345").await;
    assert!(
        matches!(result, Err(CoreError::DeviceNotFound { .. })),
        "got: {result:?}"
    );
}
