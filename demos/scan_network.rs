//! Scan a reader network
//!
//! Opens the serial port, sweeps the bus for readers and prints what each
//! one reports about itself. Bus traffic is logged at debug level.
//!
//! Usage:
//!   cargo run --example scan_network -- /dev/ttyUSB0 115200

use rfidnet::{init_tracing, NetworkConfig, NetworkController, SerialTransport, TrafficLogger};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let args: Vec<String> = std::env::args().collect();
    let mut config = NetworkConfig::load()?;
    match args.len() {
        3 => {
            config.serial.port = args[1].clone();
            config.serial.baud_rate = args[2].parse().unwrap_or(config.serial.baud_rate);
        }
        2 => config.serial.port = args[1].clone(),
        _ => {
            println!("Usage: scan_network <port> [baud_rate]");
            println!("\nAvailable ports:");
            for port in rfidnet::core::transport::list_ports()? {
                println!("  {}", port.port_name);
            }
            return Ok(());
        }
    }

    println!(
        "Connecting to {} at {} baud...",
        config.serial.port, config.serial.baud_rate
    );
    let transport = SerialTransport::open(config.serial.clone())?;
    let network = Arc::new(NetworkController::start(Box::new(transport), config));
    let logger = TrafficLogger::attach(network.dispatcher());

    let roster = network.readers(true).await?;
    println!("Found {} readers.", roster.len());

    for entry in roster.iter() {
        let reader = network.reader(*entry);
        match reader.get_version_info().await? {
            Some(v) => println!(
                "{}: controller fw {:.1} hw {:.1}, RF fw {:.1} hw {:.1}",
                entry,
                v.controller_firmware,
                v.controller_hardware,
                v.rf_firmware,
                v.rf_hardware
            ),
            None => println!("{}: no version reply", entry),
        }
        if let Some(volts) = reader.get_supply_voltage().await? {
            println!("    supply {:.1} V", volts);
        }
    }

    let traffic = logger.counters();
    println!(
        "\n{} chunks, {} bytes, {} packets; decoder {:?}",
        traffic.chunks,
        traffic.bytes,
        traffic.packets,
        network.decoder_stats()
    );

    logger.detach();
    network.shutdown().await;
    Ok(())
}
