mod common;
use common::*;

use inverter_link::device::{self, Device, LinkOptions};
use inverter_link::prelude::*;
use inverter_link::voltronic::{codec, decoder, Setting};

use std::time::Duration;

const QPIGS: &str = "230.0 50.0 230.0 50.0 0600 0550 010 400 52.60 010 090 0040 006.1 095.0 52.60 00000 00000000 00 00 00555 00000000 00 00 0000";

#[tokio::test]
async fn qpigs_over_tcp() {
    common_setup();

    let mock = MockDevice::start(vec![Exchange::new(
        codec::packet_for("QPIGS"),
        Factory::ascii_reply(QPIGS),
    )])
    .await;
    let endpoint: Endpoint = mock.tcp_endpoint().parse().unwrap();

    let decoded = device::execute(&endpoint, "QPIGS").await;
    assert_eq!(decoded.get_str("grid_voltage"), Some("230.0"));
    assert_eq!(decoded.get_str("battery_capacity"), Some("090"));
    assert_eq!(decoded.get_str("pv_charging_power"), Some("00555"));

    mock.finish().await;
}

#[tokio::test]
async fn line_feed_terminated_reply() {
    common_setup();

    let mut reply = b"(B".to_vec();
    reply.push(codec::LF);
    let mock = MockDevice::start(vec![Exchange::new(codec::packet_for("QMOD"), reply)]).await;
    let endpoint: Endpoint = mock.tcp_endpoint().parse().unwrap();

    let decoded = device::execute(&endpoint, "QMOD").await;
    assert_eq!(decoded.get_str("operating_mode"), Some("Battery"));

    mock.finish().await;
}

#[tokio::test]
async fn nak_is_an_error() {
    common_setup();

    let mock = MockDevice::start(vec![Exchange::new(
        codec::packet_for("QPIRI"),
        Factory::ascii_reply("NAK"),
    )])
    .await;
    let endpoint: Endpoint = mock.tcp_endpoint().parse().unwrap();

    assert_eq!(
        device::execute(&endpoint, "QPIRI").await,
        Decoded::error(decoder::NAK_RESPONSE)
    );

    mock.finish().await;
}

#[tokio::test]
async fn silent_device_times_out() {
    common_setup();

    let mock = MockDevice::start(vec![Exchange::silent(codec::packet_for("QPIGS"))]).await;
    let endpoint: Endpoint = mock.tcp_endpoint().parse().unwrap();
    let options = LinkOptions {
        timeout: Some(Duration::from_millis(200)),
        ..LinkOptions::default()
    };

    let decoded = Device::new(endpoint, &options).execute("QPIGS").await;
    assert_eq!(decoded, Decoded::error("timeout after 200ms"));

    mock.finish().await;
}

#[tokio::test]
async fn closed_port_is_an_error_not_a_panic() {
    common_setup();

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let endpoint: Endpoint = format!("tcp://127.0.0.1:{}", port).parse().unwrap();

    let decoded = device::execute(&endpoint, "QPIGS").await;
    assert!(decoded.is_error());
}

#[tokio::test]
async fn setting_write_is_acknowledged() {
    common_setup();

    let mock = MockDevice::start(vec![
        Exchange::new(codec::encode("POP01"), Factory::ascii_reply("ACK")),
        Exchange::new(codec::encode("MUCHGC030"), Factory::ascii_reply("NAK")),
    ])
    .await;
    let endpoint: Endpoint = mock.tcp_endpoint().parse().unwrap();

    let priority: Setting = "output_source_priority=SBU".parse().unwrap();
    assert_eq!(device::write(&endpoint, &priority).await, Decoded::status("ACK"));

    let current: Setting = "max_utility_charging_current=30".parse().unwrap();
    assert_eq!(device::write(&endpoint, &current).await, Decoded::status("NAK"));

    mock.finish().await;
}
