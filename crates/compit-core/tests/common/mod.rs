// Shared wiremock fixtures for coordinator and entity tests.

#![allow(dead_code, clippy::unwrap_used)]

pub mod socket;

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use compit_core::{CoordinatorConfig, SyncMode};

pub fn config(server: &MockServer) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::new("user@example.com", SecretString::from("hunter2".to_owned()));
    config.api_url = Url::parse(&server.uri()).unwrap();
    config.mode = SyncMode::Polling;
    config.timeout = Duration::from_secs(5);
    // Long enough that no tick fires while a test runs.
    config.scan_interval = Duration::from_secs(3600);
    config
}

pub fn living_room() -> Value {
    json!({ "id": 42, "class": 10, "type": 5, "label": "Living room" })
}

pub fn boiler() -> Value {
    json!({ "id": 43, "class": 1, "type": 12, "label": "Boiler" })
}

pub async fn mount_authorize(server: &MockServer, devices: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-123",
            "gates": [{ "id": 1, "code": "G-0001", "label": "Home", "devices": devices }]
        })))
        .mount(server)
        .await;
}

pub fn living_room_state(target: f64) -> Value {
    json!({
        "errors": [],
        "last_connected_at": "2026-10-17T08:00:00Z",
        "params": [
            { "code": "__tpokojowa", "value": 20.5, "write": false },
            { "code": "__tpokzadana", "value": target, "min": 10, "max": 30, "write": true },
            { "code": "__tempzadpracareczna", "value": 21, "write": true },
            { "code": "__trybpracytermostatu", "value": 2, "value_code": "__reczny", "value_label": "Manual", "write": true },
            { "code": "__trybpracyinstalacji", "value": 0, "write": true },
            { "code": "__blokada", "value": 1, "write": true },
            { "code": "__wilgotnosc", "value": 45, "hidden": true },
            { "code": "__wersja", "value": "NANO-COLOR-2 build 2026.09.30-rc4" }
        ]
    })
}

pub fn boiler_state() -> Value {
    json!({
        "errors": [],
        "params": [
            { "code": "__tzew", "value": 4.5 },
            { "code": "__tzadcwu", "value": 50, "min": 35, "max": 60, "write": true },
            { "code": "__ochrona", "value": 0, "write": true }
        ]
    })
}

pub async fn mount_state(server: &MockServer, device_id: u64, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/devices/{device_id}/state")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_write(server: &MockServer, device_id: u64) {
    Mock::given(method("PUT"))
        .and(path(format!("/devices/{device_id}/params")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(server)
        .await;
}
