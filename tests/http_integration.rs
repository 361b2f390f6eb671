// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the alarm manager HTTP client using wiremock.

use alarm_watcher::error::FetchError;
use alarm_watcher::protocol::{ApiClient, HttpConfig, SnapshotSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    HttpConfig::new(server.uri()).into_client().unwrap()
}

async fn mount_devices(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, device_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/devices/status/{device_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ============================================================================
// Snapshot fetching
// ============================================================================

mod snapshot {
    use super::*;

    #[tokio::test]
    async fn fetch_one_device() {
        let server = MockServer::start().await;
        mount_devices(
            &server,
            serde_json::json!({"success": true, "data": {"deviceid": "Home Alarm"}}),
        )
        .await;
        mount_status(
            &server,
            "deviceid",
            serde_json::json!({
                "success": true,
                "msg": "",
                "mode": "disarmed",
                "firing": false,
                "online": true
            }),
        )
        .await;

        let snapshot = client_for(&server).fetch_snapshot().await.unwrap();

        assert_eq!(snapshot.len(), 1);
        let device = &snapshot.devices()["deviceid"];
        assert_eq!(device.id(), "deviceid");
        assert_eq!(device.name(), "Home Alarm");
        assert_eq!(device.mode(), "disarmed");
        assert!(!device.firing());
        assert!(device.online());
    }

    #[tokio::test]
    async fn fetch_several_devices() {
        let server = MockServer::start().await;
        mount_devices(
            &server,
            serde_json::json!({"success": true, "data": {"b": "Garage", "a": "House"}}),
        )
        .await;
        mount_status(
            &server,
            "a",
            serde_json::json!({"success": true, "mode": "armed", "firing": true, "online": true}),
        )
        .await;
        mount_status(
            &server,
            "b",
            serde_json::json!({
                "success": true,
                "mode": "disarmed",
                "firing": false,
                "online": false
            }),
        )
        .await;

        let snapshot = client_for(&server).fetch_snapshot().await.unwrap();

        let ids: Vec<&str> = snapshot.devices().keys().map(String::as_str).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(snapshot.devices()["a"].firing());
        assert_eq!(snapshot.devices()["b"].name(), "Garage");
    }

    #[tokio::test]
    async fn empty_device_list() {
        let server = MockServer::start().await;
        mount_devices(&server, serde_json::json!({"success": true, "data": {}})).await;

        let snapshot = client_for(&server).fetch_snapshot().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn device_id_is_url_encoded() {
        let server = MockServer::start().await;
        mount_devices(
            &server,
            serde_json::json!({"success": true, "data": {"front door": "Front"}}),
        )
        .await;
        mount_status(
            &server,
            "front%20door",
            serde_json::json!({"success": true, "mode": "armed", "firing": false, "online": true}),
        )
        .await;

        let snapshot = client_for(&server).fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.devices()["front door"].mode(), "armed");
    }
}

// ============================================================================
// Failures
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn rejected_device_status_fails_whole_snapshot() {
        let server = MockServer::start().await;
        mount_devices(
            &server,
            serde_json::json!({"success": true, "data": {"a": "House", "b": "Garage"}}),
        )
        .await;
        mount_status(
            &server,
            "a",
            serde_json::json!({"success": true, "mode": "armed", "firing": false, "online": true}),
        )
        .await;
        mount_status(
            &server,
            "b",
            serde_json::json!({"success": false, "msg": "device unreachable"}),
        )
        .await;

        let err = client_for(&server).fetch_snapshot().await.unwrap_err();
        match err {
            FetchError::Rejected(msg) => assert_eq!(msg, "device unreachable"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rejected_device_list() {
        let server = MockServer::start().await;
        mount_devices(
            &server,
            serde_json::json!({"success": false, "msg": "not ready"}),
        )
        .await;

        let err = client_for(&server).fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, FetchError::Rejected(msg) if msg == "not ready"));
    }

    #[tokio::test]
    async fn server_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, FetchError::Json(_)));
    }

    #[tokio::test]
    async fn missing_status_endpoint() {
        let server = MockServer::start().await;
        mount_devices(
            &server,
            serde_json::json!({"success": true, "data": {"a": "House"}}),
        )
        .await;

        let err = client_for(&server).fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }
}
