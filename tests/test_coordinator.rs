mod common;
use common::*;

use inverter_link::coordinator::Coordinator;
use inverter_link::modbus::{frame, registers, SENSOR_BLOCK_COUNT, SENSOR_BLOCK_START};
use inverter_link::prelude::*;
use inverter_link::snapshot::InverterSnapshot;
use inverter_link::voltronic::{codec, decoder, Setting};

use std::time::Duration;

const QPIGS: &str = "230.0 50.0 230.0 50.0 0600 0550 010 400 52.60 010 090 0040 006.1 095.0 52.60 00000 00000000 00 00 00555 00000000 00 00 0000";
const QPIRI: &str = "230.0 21.7 230.0 50.0 21.7 5000 5000 48.0 46.0 42.0 56.4 54.0 2 02 060 1 2 3 9 01 0 0 54.0 0 1 000";

async fn wait_for_snapshot(coordinator: &Coordinator) -> InverterSnapshot {
    for _ in 0..100 {
        if let Some(snapshot) = coordinator.snapshot("main") {
            if snapshot.sensors.is_some() && snapshot.settings.is_some() {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no snapshot after polling");
}

#[tokio::test]
async fn polls_ascii_inverter_and_marks_failures_stale() {
    common_setup();

    let mock = MockDevice::start(vec![
        Exchange::new(codec::packet_for("QPIGS"), Factory::ascii_reply(QPIGS)),
        Exchange::new(codec::packet_for("QPIRI"), Factory::ascii_reply(QPIRI)),
        Exchange::new(codec::packet_for("QPIGS"), Factory::ascii_reply("NAK")),
    ])
    .await;
    let config = Factory::config(&mock.tcp_endpoint(), "    commands: [QPIGS, QPIRI]\n");
    let coordinator = Coordinator::new(ConfigWrapper::from_config(config)).unwrap();

    let poller = coordinator.clone();
    let handle = tokio::spawn(async move { poller.start().await });

    let snapshot = wait_for_snapshot(&coordinator).await;
    assert!(!snapshot.stale);
    let sensors = snapshot.sensors.unwrap();
    assert_eq!(sensors.grid_voltage, 230.0);
    assert_eq!(sensors.battery_capacity, 90.0);
    assert_eq!(sensors.battery_power, 52.6 * 10.0);
    assert_eq!(snapshot.settings.unwrap().bulk_charging_voltage, 56.4);
    assert_eq!(snapshot.rated.unwrap().rated_battery_voltage, 48.0);

    // a failed refresh keeps the old data but flags it
    assert_eq!(
        coordinator.execute("main", "QPIGS").await,
        Decoded::error(decoder::NAK_RESPONSE)
    );
    let cached = coordinator.cached("main", "QPIGS").unwrap();
    assert!(cached.stale);
    assert_eq!(cached.data.get_str("grid_voltage"), Some("230.0"));
    assert!(coordinator.snapshot("main").unwrap().stale);

    coordinator.stop();
    handle.await.unwrap().unwrap();
    mock.finish().await;

    // nothing runs once stopped
    let setting: Setting = "output_source_priority=SBU".parse().unwrap();
    assert_eq!(coordinator.write("main", &setting).await, Decoded::status("FAIL"));
}

#[tokio::test]
async fn modbus_writes_go_through_the_queue() {
    common_setup();

    let mut sensors = vec![0u16; SENSOR_BLOCK_COUNT as usize];
    sensors[(201 - SENSOR_BLOCK_START) as usize] = 2; // Mains
    sensors[(215 - SENSOR_BLOCK_START) as usize] = 532;
    sensors[(216 - SENSOR_BLOCK_START) as usize] = 120; // +12.0 A
    sensors[(217 - SENSOR_BLOCK_START) as usize] = 640;

    let write = frame::write_single_request(1, registers::CHARGER_PRIORITY, 2);
    let mock = MockDevice::start(vec![
        Exchange::new(
            frame::read_request(1, SENSOR_BLOCK_START, SENSOR_BLOCK_COUNT),
            Factory::read_reply(1, &sensors),
        ),
        Exchange::new(write.clone(), Factory::write_reply(&write)),
    ])
    .await;
    let config = Factory::config(&mock.modbus_endpoint(), "    commands: [SENSORS]\n");
    let coordinator = Coordinator::new(ConfigWrapper::from_config(config)).unwrap();

    let poller = coordinator.clone();
    let handle = tokio::spawn(async move { poller.start().await });

    let mut snapshot = None;
    for _ in 0..100 {
        snapshot = coordinator.snapshot("main");
        if snapshot.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let sensors = snapshot.unwrap().sensors.unwrap();
    assert_eq!(sensors.battery_voltage, 53.2);
    assert_eq!(sensors.battery_current, 12.0);
    assert_eq!(sensors.battery_power, 640.0);
    assert!(sensors.charging_ac_active);

    let setting: Setting = "charger_source_priority=solarandutility".parse().unwrap();
    assert_eq!(coordinator.write("main", &setting).await, Decoded::status("OK"));

    assert_eq!(
        coordinator.write("nobody", &setting).await,
        Decoded::error("unknown inverter nobody")
    );

    coordinator.stop();
    handle.await.unwrap().unwrap();
    mock.finish().await;
}
