#![allow(clippy::unwrap_used)]

// Integration tests for the switch platform and device-registry info.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gree_cloud_core::{DOMAIN, GREE_SWITCHES, GreeCloudRuntime, GreeSwitch, SwitchPlatform};
use pretty_assertions::assert_eq;

use common::{Harness, MAC_A, MAC_B, props, test_config};

type Added = Arc<Mutex<Vec<GreeSwitch>>>;

async fn setup(h: &Harness) -> GreeCloudRuntime {
    GreeCloudRuntime::setup(test_config(), h.api(), h.session(), h.devices())
        .await
        .unwrap()
}

async fn attach(runtime: &GreeCloudRuntime) -> Added {
    let added: Added = Arc::default();
    let sink = Arc::clone(&added);
    SwitchPlatform::attach(runtime, move |switches| {
        sink.lock().unwrap().extend(switches);
    })
    .await;
    added
}

fn switch(added: &Added, unique_id: &str) -> GreeSwitch {
    added
        .lock()
        .unwrap()
        .iter()
        .find(|s| s.unique_id() == unique_id)
        .cloned()
        .unwrap()
}

#[test]
fn switch_table_maps_vendor_properties() {
    let pairs: Vec<_> = GREE_SWITCHES.iter().map(|d| (d.key, d.property)).collect();
    assert_eq!(
        pairs,
        vec![
            ("Panel Light", "Lig"),
            ("Quiet", "Quiet"),
            ("Fresh Air", "Air"),
            ("XFan", "Blo"),
            ("Health mode", "Health"),
        ]
    );
    let disabled: Vec<_> = GREE_SWITCHES
        .iter()
        .filter(|d| !d.enabled_by_default)
        .map(|d| d.key)
        .collect();
    assert_eq!(disabled, vec!["Health mode"]);
}

#[tokio::test]
async fn attach_adds_switches_for_existing_devices() {
    let h = Harness::new();
    h.cloud.add_device(MAC_A, "Living Room");
    h.factory
        .script(MAC_A)
        .set_remote(props(&[("Lig", 1), ("Quiet", 0), ("Air", 1)]));
    let runtime = setup(&h).await;

    let added = attach(&runtime).await;

    assert_eq!(added.lock().unwrap().len(), GREE_SWITCHES.len());
    let light = switch(&added, &format!("{MAC_A}_Panel Light"));
    assert_eq!(light.is_on(), Some(true));
    assert!(light.available());
    assert_eq!(switch(&added, &format!("{MAC_A}_Quiet")).is_on(), Some(false));
    // Not reported by the device.
    assert_eq!(switch(&added, &format!("{MAC_A}_XFan")).is_on(), None);

    runtime.unload().await;
}

#[tokio::test]
async fn device_info_falls_back_to_unknown_model() {
    let h = Harness::new();
    h.cloud.add_device(MAC_A, "Living Room");
    h.cloud.add_device(MAC_B, "Bedroom");
    h.factory.script(MAC_B).set_hid("GR-5678");
    let runtime = setup(&h).await;
    let added = attach(&runtime).await;

    let a = switch(&added, &format!("{MAC_A}_Quiet")).device_info();
    assert_eq!(a.identifiers, (DOMAIN.to_owned(), MAC_A.to_owned()));
    assert_eq!(a.manufacturer, "Gree");
    assert_eq!(a.model, "Unknown Model");
    assert_eq!(a.name, "Living Room");

    let b = switch(&added, &format!("{MAC_B}_Quiet")).device_info();
    assert_eq!(b.model, "GR-5678");

    runtime.unload().await;
}

#[tokio::test]
async fn turning_on_pushes_and_reflects_immediately() {
    let h = Harness::new();
    h.cloud.add_device(MAC_A, "Living Room");
    h.factory.script(MAC_A).set_remote(props(&[("Pow", 1), ("Blo", 0)]));
    let runtime = setup(&h).await;
    let added = attach(&runtime).await;
    let xfan = switch(&added, &format!("{MAC_A}_XFan"));

    xfan.turn_on().await;

    assert_eq!(xfan.is_on(), Some(true));
    let pushed = h.factory.script(MAC_A).pushed();
    assert_eq!(pushed, vec![props(&[("Pow", 1), ("Blo", 1)])]);

    xfan.turn_off().await;
    assert_eq!(xfan.is_on(), Some(false));

    runtime.unload().await;
}

#[tokio::test]
async fn later_discoveries_get_switches() {
    let h = Harness::new();
    h.cloud.add_device(MAC_A, "Living Room");
    let runtime = setup(&h).await;
    let added = attach(&runtime).await;
    assert_eq!(added.lock().unwrap().len(), GREE_SWITCHES.len());

    h.cloud.add_device(MAC_B, "Bedroom");
    runtime.rediscover().await.unwrap();

    // Let the platform listener drain the channel.
    for _ in 0..10 {
        if added.lock().unwrap().len() == 2 * GREE_SWITCHES.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(added.lock().unwrap().len(), 2 * GREE_SWITCHES.len());
    assert!(
        added
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.unique_id() == format!("{MAC_B}_Fresh Air"))
    );

    runtime.unload().await;
}

#[tokio::test]
async fn switches_become_unavailable_with_their_device() {
    let h = Harness::new();
    h.cloud.add_device(MAC_A, "Living Room");
    let runtime = setup(&h).await;
    let added = attach(&runtime).await;
    let quiet = switch(&added, &format!("{MAC_A}_Quiet"));

    h.factory
        .script(MAC_A)
        .queue_updates([common::Step::Timeout, common::Step::Timeout, common::Step::Timeout]);
    let coordinator = Arc::clone(quiet.coordinator());
    for _ in 0..3 {
        let _ = coordinator.refresh().await;
    }

    assert!(!quiet.available());
    runtime.unload().await;
}
