// Entity adapter tests: discovery, value resolution and write paths.

#![allow(clippy::unwrap_used)]

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use compit_core::{Coordinator, CoreError, Entity, HvacMode, Platform};

use common::{
    boiler, boiler_state, config, living_room, living_room_state, mount_authorize, mount_state,
};

async fn living_room_coordinator(server: &MockServer) -> Coordinator {
    mount_authorize(server, vec![living_room()]).await;
    mount_state(server, 42, living_room_state(21.0)).await;
    Coordinator::setup(config(server)).await.unwrap()
}

async fn expect_write(server: &MockServer, code: &str, value: serde_json::Value) {
    Mock::given(method("PUT"))
        .and(path("/devices/42/params"))
        .and(body_json(json!({ "values": [{ "code": code, "value": value }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(server)
        .await;
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_follows_classification() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    let entities = coordinator.entities();

    let ids = |platform: Platform| -> Vec<String> {
        entities
            .iter()
            .filter(|e| e.platform() == platform)
            .map(|e| e.unique_id().to_owned())
            .collect()
    };
    assert_eq!(ids(Platform::Sensor), vec!["42___tpokojowa", "42___wersja"]);
    assert_eq!(
        ids(Platform::Number),
        vec!["42___tpokzadana", "42___tempzadpracareczna"]
    );
    assert_eq!(
        ids(Platform::Select),
        vec!["42___trybpracytermostatu", "42___trybpracyinstalacji"]
    );
    assert_eq!(ids(Platform::Switch), vec!["42___blokada"]);
    assert_eq!(ids(Platform::Climate), vec!["42_climate"]);
    assert_eq!(entities.len(), 8);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn entities_carry_device_identity() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    let entities = coordinator.entities();

    let number = entities.find("42___tpokzadana").unwrap();
    assert_eq!(number.name(), "Living room Target temperature");
    assert_eq!(number.device_id(), 42);
    assert!(number.available());

    let info = number.device_info();
    assert_eq!(info.identifiers, ("compit".to_owned(), "42".to_owned()));
    assert_eq!(info.name, "Living room");
    assert_eq!(info.manufacturer, "Compit");
    assert_eq!(info.model, "Nano Color 2");

    coordinator.shutdown().await;
}

#[tokio::test]
async fn boiler_gets_no_climate_entity() {
    let server = MockServer::start().await;
    mount_authorize(&server, vec![boiler()]).await;
    mount_state(&server, 43, boiler_state()).await;
    let coordinator = Coordinator::setup(config(&server)).await.unwrap();

    let entities = coordinator.entities();
    assert!(entities.climates.is_empty());
    assert_eq!(entities.sensors.len(), 1);
    assert_eq!(entities.numbers.len(), 1);
    assert_eq!(entities.switches.len(), 1);
    assert!(!entities.switches[0].is_on().unwrap());
    assert_eq!(
        entities.switches[0].extra_state_attributes(),
        Some(json!({
            "details": [{ "device": "Boiler", "device_id": 43, "device_class": 1, "device_type": 12 }]
        }))
    );

    coordinator.shutdown().await;
}

// ── Values ──────────────────────────────────────────────────────────

#[tokio::test]
async fn number_reports_value_and_bounds() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    let entities = coordinator.entities();

    let target = &entities.numbers[0];
    assert_eq!(target.code(), "__tpokzadana");
    assert_eq!(target.native_value(), Some(21.0));
    assert_eq!(target.min_value(), 10.0);
    assert_eq!(target.max_value(), 30.0);
    assert_eq!(target.unit(), Some("°C"));

    // No live bounds: falls back to the definition.
    let manual = &entities.numbers[1];
    assert_eq!(manual.min_value(), 5.0);
    assert_eq!(manual.max_value(), 35.0);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn long_sensor_values_move_to_raw_attribute() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    let entities = coordinator.entities();

    let room = &entities.sensors[0];
    assert_eq!(room.native_value(), Some(json!(20.5)));
    assert_eq!(room.extra_state_attributes(), None);
    assert_eq!(room.display_value().as_deref(), Some("20.5 °C"));

    let version = &entities.sensors[1];
    assert_eq!(version.native_value(), None);
    assert_eq!(
        version.extra_state_attributes(),
        Some(json!({ "raw": "NANO-COLOR-2 build 2026.09.30-rc4" }))
    );

    coordinator.shutdown().await;
}

#[tokio::test]
async fn select_resolves_current_option() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    let entities = coordinator.entities();

    let mode = &entities.selects[0];
    assert_eq!(mode.options(), vec!["Auto", "Holiday", "Manual", "Away"]);
    assert_eq!(mode.current_option().as_deref(), Some("Manual"));

    let installation = &entities.selects[1];
    assert_eq!(installation.current_option().as_deref(), Some("Heating"));
    let attributes = installation.extra_state_attributes().unwrap();
    assert_eq!(attributes["details"][0]["device_type"], json!(5));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn climate_composes_well_known_codes() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    let entities = coordinator.entities();

    let climate = &entities.climates[0];
    assert_eq!(climate.name(), "Living room climate");
    assert_eq!(climate.current_temperature(), Some(20.5));
    assert_eq!(climate.target_temperature(), Some(21.0));
    assert_eq!(climate.hvac_mode(), Some(HvacMode::Heat));
    assert_eq!(climate.preset_mode().as_deref(), Some("Manual"));
    assert_eq!(climate.fan_mode(), None);
    assert_eq!(climate.fan_modes().unwrap().len(), 4);
    assert_eq!(climate.temperature_unit(), "°C");

    coordinator.shutdown().await;
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn number_write_goes_through_coordinator() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    expect_write(&server, "__tpokzadana", json!(22.5)).await;

    let entities = coordinator.entities();
    entities.numbers[0].set_native_value(22.5).await.unwrap();

    let err = entities.numbers[0].set_native_value(31.0).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn select_writes_detail_state() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    expect_write(&server, "__trybpracytermostatu", json!(3)).await;

    let entities = coordinator.entities();
    entities.selects[0].select_option("Away").await.unwrap();

    let err = entities.selects[0].select_option("Turbo").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn switch_writes_off_detail() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    expect_write(&server, "__blokada", json!(0)).await;

    let entities = coordinator.entities();
    let lock = &entities.switches[0];
    assert_eq!(lock.is_on(), Some(true));
    lock.toggle().await.unwrap();

    coordinator.shutdown().await;
}

#[tokio::test]
async fn set_temperature_selects_manual_preset_first() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    expect_write(&server, "__trybpracytermostatu", json!(2)).await;
    expect_write(&server, "__tempzadpracareczna", json!(23.0)).await;

    let entities = coordinator.entities();
    entities.climates[0].set_temperature(23.0).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let writes: Vec<serde_json::Value> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(writes[0]["values"][0]["code"], json!("__trybpracytermostatu"));
    assert_eq!(writes[1]["values"][0]["code"], json!("__tempzadpracareczna"));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn climate_modes_map_to_detail_states() {
    let server = MockServer::start().await;
    let coordinator = living_room_coordinator(&server).await;
    expect_write(&server, "__trybpracyinstalacji", json!(2)).await;
    expect_write(&server, "__trybaero", json!(1)).await;

    let entities = coordinator.entities();
    let climate = &entities.climates[0];
    climate.set_hvac_mode(HvacMode::Cool).await.unwrap();
    climate.set_fan_mode("Gear 1").await.unwrap();
    assert!(matches!(
        climate.set_preset_mode("Party").await,
        Err(CoreError::Validation { .. })
    ));

    coordinator.shutdown().await;
}
