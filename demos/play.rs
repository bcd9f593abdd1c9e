//! Play an RTSP stream over TCP and print one line per RTP packet.
//!
//! ```text
//! RUST_LOG=rtsp_interleaved_client=debug cargo run --example play -- rtsp://192.168.1.20:8554/live
//! ```
//!
//! A JSON configuration file can be given instead of a URL:
//!
//! ```text
//! cargo run --example play -- --config client.json
//! ```

use std::time::Duration;

use rtsp_interleaved_client::{ClientBuilder, ClientConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let config = match (args.next(), args.next()) {
        (Some(flag), Some(path)) if flag == "--config" => {
            ClientConfig::from_json(&std::fs::read_to_string(path)?)?
        }
        (Some(url), None) => {
            let mut config = ClientConfig::new(url);
            config.keepalive_interval = Some(Duration::from_secs(30));
            config
        }
        _ => {
            eprintln!("usage: play <rtsp-url> | play --config <file.json>");
            std::process::exit(2);
        }
    };

    let mut client = ClientBuilder::from_config(config).start().await?;

    loop {
        tokio::select! {
            packet = client.recv() => match packet {
                Some(packet) => println!(
                    "#{:<8} ch={} pt={:<3} seq={:<5} ts={:<10} marker={} len={}",
                    packet.index,
                    packet.channel,
                    packet.header.payload_type,
                    packet.sequence_number(),
                    packet.timestamp(),
                    packet.is_marker(),
                    packet.size(),
                ),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                client.shutdown();
            }
        }
    }

    let stats = client.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    client.wait_for_shutdown().await?;
    Ok(())
}
