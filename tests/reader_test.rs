//! Reader commands against an emulated reader

mod common;

use common::{fast_config, reply_to, BusHandle, FakeBus};
use rfidnet::core::protocol::{AlarmFilter, Code, GainMode, TagType, TransmissionInterval};
use rfidnet::{
    Command, NetworkController, NetworkError, Packet, ProtocolError, ReaderAddress,
    ReaderCommands,
};
use std::sync::Arc;

const TAG_PAYLOAD: [u8; 32] = [
    0x21, 0x2a, 0x2a, 0x20, 0x81, 0x11, 0x42, 0x43, 0x02, 0x00, 0x00, 0x01, 0x00, 0x1e, 0xac,
    0xac, 0x00, 0x0f, 0x2a, 0xef, 0x30, 0x05, 0x68, 0x32, 0x20, 0x51, 0x02, 0x00, 0x40, 0x11,
    0x0a, 0x0d,
];

/// Answers like a single reader at node 2 holding its settings in memory
fn emulated_reader() -> (FakeBus, BusHandle) {
    let mut rssi = 0u8;
    let mut site = [0u8; 3];
    let mut gain = 1u8;
    let mut filter = 0u8;

    FakeBus::new(
        4,
        Box::new(move |request: &Packet| {
            if request.node_id() != 2 {
                return None;
            }
            let data = request.payload();
            let payload: Vec<u8> = match request.command()? {
                Command::Ping => vec![0],
                Command::SetNetworkId | Command::SetReaderId => data.to_vec(),
                Command::GetTagPacket => TAG_PAYLOAD.to_vec(),
                Command::SetRssiThreshold => {
                    rssi = data[0];
                    vec![rssi]
                }
                Command::GetRssiThreshold => vec![rssi],
                Command::SetSiteCode => {
                    site.copy_from_slice(&data[..3]);
                    site.to_vec()
                }
                Command::GetSiteCode => site.to_vec(),
                Command::SetReceiverGain => {
                    gain = data[0];
                    vec![gain]
                }
                Command::GetReceiverGain => vec![gain],
                Command::SetAlarmFilter => {
                    filter = data[0];
                    vec![filter]
                }
                Command::GetAlarmFilter => vec![filter],
                Command::GetInvalidTagCount => vec![0x01, 0x2C],
                Command::GetSupplyVoltage => vec![123],
                Command::GetWhiteNoise => vec![0x3A],
                Command::GetVersionInfo => vec![12, 30, 10, 21],
                _ => vec![],
            };
            Some(reply_to(request, &payload))
        }),
    )
}

fn reader(network: &Arc<NetworkController>) -> ReaderCommands {
    network.reader(ReaderAddress::new(0, 0, 2))
}

#[tokio::test]
async fn test_getters_decode_values() {
    let (bus, _handle) = emulated_reader();
    let network = Arc::new(NetworkController::start(Box::new(bus), fast_config()));
    let reader = reader(&network);

    assert!(reader.ping().await.unwrap().unwrap().is_ok());
    assert_eq!(reader.get_invalid_tag_count().await.unwrap(), Some(300));
    let volts = reader.get_supply_voltage().await.unwrap().unwrap();
    assert!((volts - 12.3).abs() < 1e-5);
    assert_eq!(reader.get_white_noise().await.unwrap(), Some(0x3A));

    let version = reader.get_version_info().await.unwrap().unwrap();
    assert!((version.controller_firmware - 1.2).abs() < 1e-5);
    assert!((version.rf_firmware - 3.0).abs() < 1e-5);
    assert!((version.rf_hardware - 2.1).abs() < 1e-5);
    network.shutdown().await;
}

#[tokio::test]
async fn test_settings_round_trip_through_reader() {
    let (bus, _handle) = emulated_reader();
    let network = Arc::new(NetworkController::start(Box::new(bus), fast_config()));
    let reader = reader(&network);

    reader.set_rssi_threshold(0x55).await.unwrap();
    assert_eq!(reader.get_rssi_threshold().await.unwrap(), Some(0x55));

    reader.set_site_code([0x1E, 0xAC, 0xAC]).await.unwrap();
    let site = reader.get_site_code().await.unwrap().unwrap();
    assert_eq!(site.value(), 0x1E_ACAC);
    assert!(!site.is_disabled());

    reader.set_receiver_gain(GainMode::Low).await.unwrap();
    assert_eq!(
        reader.get_receiver_gain().await.unwrap(),
        Some(Code::Known(GainMode::Low))
    );

    reader.set_alarm_filter_raw(2).await.unwrap();
    assert_eq!(
        reader.get_alarm_filter().await.unwrap(),
        Some(Code::Known(AlarmFilter::WithoutAlarm))
    );
    network.shutdown().await;
}

#[tokio::test]
async fn test_tag_packet_is_decoded() {
    let (bus, _handle) = emulated_reader();
    let network = Arc::new(NetworkController::start(Box::new(bus), fast_config()));

    let tag = reader(&network).get_tag_packet().await.unwrap().unwrap();
    assert_eq!(tag.interval, Code::Known(TransmissionInterval::Sec15));
    assert_eq!(tag.interval.to_string(), "15 sec");
    assert!(tag.reed);
    assert_eq!(tag.counter, 1);
    assert_eq!(tag.age, 256);
    assert_eq!(tag.tag_id, 0x000F_2AEF);
    assert_eq!(tag.tag_type, Code::Known(TagType::FusedNonProgrammable));
    assert_eq!(tag.reader_address, 5);
    assert_eq!(tag.node_id, 2);
    assert_eq!(tag.reader_rssi, 0x40);
    network.shutdown().await;
}

#[tokio::test]
async fn test_invalid_arguments_send_nothing() {
    let (bus, handle) = emulated_reader();
    let network = Arc::new(NetworkController::start(Box::new(bus), fast_config()));
    let reader = reader(&network);

    assert!(matches!(
        reader.set_receiver_gain_raw(7).await,
        Err(NetworkError::Protocol(ProtocolError::InvalidArgument(_)))
    ));
    assert!(matches!(
        reader.set_alarm_filter_raw(3).await,
        Err(NetworkError::Protocol(ProtocolError::InvalidArgument(_)))
    ));
    assert!(matches!(
        reader.set_baud_rate(12_345).await,
        Err(NetworkError::Protocol(ProtocolError::InvalidArgument(_)))
    ));
    assert!(handle.written().is_empty());
    network.shutdown().await;
}

#[tokio::test]
async fn test_set_reader_id_skips_unchanged_id() {
    let (bus, handle) = emulated_reader();
    let network = Arc::new(NetworkController::start(Box::new(bus), fast_config()));
    let mut reader = reader(&network);

    assert!(reader.set_reader_id(0).await.unwrap().is_none());
    assert!(handle.written().is_empty());

    let reply = reader.set_reader_id(17).await.unwrap().unwrap();
    assert_eq!(reply.payload(), &[17]);
    assert_eq!(reader.address().reader_id, 17);

    let sent = handle.commands();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command_code(), 0x05);
    assert_eq!(sent[0].reader_id(), 0);
    network.shutdown().await;
}

#[tokio::test]
async fn test_unanswered_getter_returns_none() {
    let (bus, _handle) = emulated_reader();
    let network = Arc::new(NetworkController::start(Box::new(bus), fast_config()));
    let absent = network
        .reader(ReaderAddress::new(0, 0, 9))
        .with_timeout(std::time::Duration::from_millis(30));

    assert_eq!(absent.get_rssi_threshold().await.unwrap(), None);
    assert!(absent.get_version_info().await.unwrap().is_none());
    assert_eq!(network.dispatcher().listener_count(), 0);
    network.shutdown().await;
}
