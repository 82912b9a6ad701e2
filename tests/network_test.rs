//! Network controller against a fake reader bus

mod common;

use common::{fast_config, reply_to, FakeBus};
use rfidnet::{Command, NetworkController, NetworkError, Packet, PacketCodec, ProtocolError};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_rescan_stops_at_first_silent_node() {
    let (bus, handle) = FakeBus::new(
        5,
        Box::new(|request: &Packet| {
            let node = request.node_id();
            (request.command() == Some(Command::Ping) && (1..=3).contains(&node)).then(|| {
                // reader ids differ from node ids on purpose
                let reply = PacketCodec::encode(0x55, 0x03, 0, node + 10, node, &[0]).unwrap();
                reply.as_bytes().to_vec()
            })
        }),
    );
    let network = NetworkController::start(Box::new(bus), fast_config());

    let roster = network.rescan().await.unwrap();
    assert_eq!(roster.len(), 3);
    let nodes: Vec<u8> = roster.iter().map(|e| e.node_id).collect();
    let readers: Vec<u8> = roster.iter().map(|e| e.reader_id).collect();
    assert_eq!(nodes, vec![1, 2, 3]);
    assert_eq!(readers, vec![11, 12, 13]);

    let pinged: Vec<u8> = handle.commands().iter().map(|p| p.node_id()).collect();
    assert_eq!(pinged, vec![1, 2, 3, 4]);
    assert_eq!(network.roster().len(), 3);
    network.shutdown().await;
}

#[tokio::test]
async fn test_rescan_skips_readers_reporting_errors() {
    let (bus, _handle) = FakeBus::new(
        64,
        Box::new(|request: &Packet| match request.node_id() {
            1 | 3 => Some(reply_to(request, &[0])),
            2 => Some(reply_to(request, &[7])),
            _ => None,
        }),
    );
    let network = NetworkController::start(Box::new(bus), fast_config());

    let roster = network.readers(true).await.unwrap();
    let nodes: Vec<u8> = roster.iter().map(|e| e.node_id).collect();
    assert_eq!(nodes, vec![1, 3]);
    network.shutdown().await;
}

#[tokio::test]
async fn test_rescan_ignores_reply_from_another_node() {
    let (bus, handle) = FakeBus::new(
        64,
        Box::new(|request: &Packet| match request.node_id() {
            1 | 3 => Some(reply_to(request, &[0])),
            // a late answer from node 1 arriving while node 2 is probed
            2 => Some(
                PacketCodec::encode(0x55, 0x03, 0, 0, 1, &[0])
                    .unwrap()
                    .as_bytes()
                    .to_vec(),
            ),
            _ => None,
        }),
    );
    let network = NetworkController::start(Box::new(bus), fast_config());

    let roster = network.rescan().await.unwrap();
    let nodes: Vec<u8> = roster.iter().map(|e| e.node_id).collect();
    assert_eq!(nodes, vec![1, 3]);
    let pinged: Vec<u8> = handle.commands().iter().map(|p| p.node_id()).collect();
    assert_eq!(pinged, vec![1, 2, 3, 4]);
    network.shutdown().await;
}

#[tokio::test]
async fn test_rescan_breaks_auto_polling_first() {
    let (bus, handle) = FakeBus::silent();
    let network = NetworkController::start(Box::new(bus), fast_config());

    assert!(network.rescan().await.unwrap().is_empty());
    let written = handle.written();
    assert_eq!(written[0], [0xFF, b'*'].repeat(4));
    assert_eq!(written.len(), 2);
    network.shutdown().await;
}

#[tokio::test]
async fn test_ask_timeout_leaves_no_listener() {
    let (bus, _handle) = FakeBus::silent();
    let network = NetworkController::start(Box::new(bus), fast_config());
    let packet = PacketCodec::command(Command::GetSupplyVoltage, 0, 0, 1, &[]).unwrap();

    let timeout = Duration::from_millis(150);
    let started = Instant::now();
    let reply = network.ask(&packet, timeout).await.unwrap();

    assert!(reply.is_none());
    assert!(started.elapsed() >= timeout);
    assert_eq!(network.dispatcher().listener_count(), 0);
    network.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_asks_get_their_own_replies() {
    let (bus, _handle) = FakeBus::new(
        2,
        Box::new(|request: &Packet| match request.command() {
            Some(Command::GetSupplyVoltage) => Some(reply_to(request, &[120])),
            Some(Command::GetRssiThreshold) => Some(reply_to(request, &[42])),
            _ => None,
        }),
    );
    let network = NetworkController::start(Box::new(bus), fast_config());
    let voltage = PacketCodec::command(Command::GetSupplyVoltage, 0, 0, 1, &[]).unwrap();
    let rssi = PacketCodec::command(Command::GetRssiThreshold, 0, 0, 2, &[]).unwrap();

    let timeout = Duration::from_secs(2);
    let (a, b) = tokio::join!(network.ask(&voltage, timeout), network.ask(&rssi, timeout));

    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();
    assert_eq!((a.command_code(), a.payload()), (0x10, &[120][..]));
    assert_eq!((b.command_code(), b.payload()), (0x07, &[42][..]));
    network.shutdown().await;
}

#[tokio::test]
async fn test_reset_is_broadcast_after_break() {
    let (bus, handle) = FakeBus::new(
        64,
        Box::new(|request: &Packet| {
            (request.command() == Some(Command::ResetNetwork)).then(|| reply_to(request, &[]))
        }),
    );
    let mut config = fast_config();
    config.network_id = 4;
    let network = NetworkController::start(Box::new(bus), config);

    let reply = network.reset().await.unwrap();
    assert!(reply.is_some());

    let written = handle.written();
    assert_eq!(written[0], [0xFF, b'*'].repeat(4));
    let reset = &handle.commands()[0];
    assert_eq!(reset.network_id(), 4);
    assert_eq!(reset.node_id(), 0xFF);
    assert_eq!(reset.command_code(), 0x00);
    network.shutdown().await;
}

#[tokio::test]
async fn test_auto_polling_commands_target_node_one() {
    let (bus, handle) = FakeBus::new(
        64,
        Box::new(|request: &Packet| Some(reply_to(request, &[]))),
    );
    let network = NetworkController::start(Box::new(bus), fast_config());

    assert!(network.start_auto_polling().await.unwrap().is_some());
    assert!(network.stop_auto_polling().await.unwrap().is_some());

    let commands = handle.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].command_code(), 0x01);
    assert_eq!(commands[1].command_code(), 0x02);
    assert!(commands.iter().all(|c| c.node_id() == 1));
    // stop also breaks the polling cycle first
    assert_eq!(handle.written().len(), 3);
    network.shutdown().await;
}

#[tokio::test]
async fn test_set_baud_rate_broadcast() {
    let (bus, handle) = FakeBus::silent();
    let mut config = fast_config();
    config.timeouts.ask_ms = 10;
    let network = NetworkController::start(Box::new(bus), config);

    assert!(network.set_baud_rate(19_200).await.unwrap().is_none());
    let command = &handle.commands()[0];
    assert_eq!(command.node_id(), 0xFF);
    assert_eq!(command.command_code(), 0xFE);
    assert_eq!(command.payload(), &[3]);

    assert!(matches!(
        network.set_baud_rate(14_400).await,
        Err(NetworkError::Protocol(ProtocolError::InvalidArgument(_)))
    ));
    assert_eq!(handle.commands().len(), 1);
    network.shutdown().await;
}

#[tokio::test]
async fn test_ping_by_reader_id() {
    let (bus, handle) = FakeBus::new(
        64,
        Box::new(|request: &Packet| (request.reader_id() == 9).then(|| reply_to(request, &[3]))),
    );
    let network = NetworkController::start(Box::new(bus), fast_config());

    let status = network
        .ping_reader_id(9, Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    assert!(!status.is_ok());
    assert_eq!(status.label(), "Command Packet checksum error");
    assert_eq!(handle.commands()[0].node_id(), 0);

    assert!(network
        .ping(5, Duration::from_millis(20))
        .await
        .unwrap()
        .is_none());
    network.shutdown().await;
}

#[tokio::test]
async fn test_garbage_on_the_bus_is_skipped() {
    let (bus, handle) = FakeBus::new(3, Box::new(|_: &Packet| None));
    let network = NetworkController::start(Box::new(bus), fast_config());
    let packet = PacketCodec::command(Command::GetWhiteNoise, 0, 0, 1, &[]).unwrap();

    let waiter = rfidnet::ReplyWaiter::register(network.dispatcher(), Some(0x12));
    let mut corrupt = reply_to(&packet, &[55]);
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xFF;
    handle.inject(&[0x00, 0x13, 0x37]);
    handle.inject(&corrupt);
    handle.inject(&reply_to(&packet, &[66]));

    let reply = waiter.await_reply(Duration::from_secs(2)).await.unwrap();
    assert_eq!(reply.payload(), &[66]);

    network.shutdown().await;
    let stats = network.decoder_stats();
    assert_eq!(stats.checksum_failures, 1);
    assert!(stats.desync_bytes >= 3);
}

#[tokio::test]
async fn test_send_after_shutdown_fails() {
    let (bus, _handle) = FakeBus::silent();
    let network = NetworkController::start(Box::new(bus), fast_config());
    network.shutdown().await;

    let packet = PacketCodec::command(Command::Ping, 0, 0, 1, &[]).unwrap();
    assert!(matches!(
        network.send(&packet).await,
        Err(NetworkError::Stopped)
    ));
}
