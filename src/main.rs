//! # EnOcean Gateway
//!
//! Host bridge for the EnOcean 4 click gateway module.
//!
//! Opens the gateway's serial port, resets the module, asks it for its
//! version and then logs every ESP3 packet it sends until Ctrl+C.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, default `config/default.toml`)
//!    - Set up logging
//!    - Open the serial port, retrying until a gateway shows up
//!    - Pulse the reset line and send `CO_RD_VERSION`
//!
//! 2. **Main Loop**
//!    - Feed received bytes through the ESP3 accumulator
//!    - Parse every ready frame and reassemble chunked ones
//!    - Log (and optionally capture) each logical packet
//!
//! 3. **Graceful Shutdown**
//!    - Log receive statistics on Ctrl+C
//!
//! Expected output:
//! ```text
//! INFO enocean_gateway: EnOcean Gateway v0.1.0 starting...
//! INFO enocean_gateway::serial: Successfully opened EnOcean gateway at /dev/ttyUSB0
//! INFO enocean_gateway: Gateway firmware 2.11.1.0 (API 2.6.3.0), chip 0185A12B "GATEWAYCTRL"
//! ```

use std::path::Path;
use std::pin::pin;

use anyhow::{Context, Result};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use enocean_gateway::capture::CaptureLog;
use enocean_gateway::config::{Config, LoggingConfig, SerialConfig};
use enocean_gateway::error::Esp3Error;
use enocean_gateway::esp3::command::{self, decode_response, decode_version};
use enocean_gateway::esp3::{Esp3Device, EspPacket, FrameAssembler, PacketHandler, PacketType};
use enocean_gateway::serial::GatewaySerial;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the rolling log
const LOG_FILE_PREFIX: &str = "enocean-gateway.log";

/// Serial read buffer size
const READ_BUFFER_SIZE: usize = 64;

/// Collects complete logical packets for the main loop
#[derive(Debug, Default)]
struct Inbox {
    assembler: FrameAssembler,
    packets: Vec<EspPacket>,
}

impl PacketHandler for Inbox {
    fn on_packet(&mut self, packet: &EspPacket, remaining_chunks: usize) {
        if let Some(full) = self.assembler.push(packet, remaining_chunks) {
            self.packets.push(full);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).with_context(|| format!("loading {}", config_path))?
    } else {
        Config::default()
    };

    let _log_guard = init_logging(&config.logging);

    info!("EnOcean Gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    let Some(mut serial) = open_gateway(&config.serial).await? else {
        info!("Received Ctrl+C before a gateway was found, exiting");
        return Ok(());
    };
    info!("Gateway serial port opened at: {}", serial.device_path());

    if config.gateway.reset_on_start {
        serial
            .pulse_reset(Duration::from_millis(config.gateway.reset_pulse_ms))
            .await?;
    }

    let mut capture = if config.capture.enabled {
        Some(CaptureLog::new(&config.capture.dir, config.capture.max_records_per_file)?)
    } else {
        None
    };

    let mut device = Esp3Device::with_queue_depth(Inbox::default(), config.gateway.rx_queue_depth);

    let response_timeout = Duration::from_millis(config.serial.timeout_ms);
    let mut version_deadline = None;
    if config.gateway.query_version_on_start {
        serial.send_packet(&command::read_version()).await?;
        version_deadline = Some(Instant::now() + response_timeout);
    }

    info!("Listening for ESP3 packets, press Ctrl+C to exit");

    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut packet_count: u64 = 0;

    loop {
        let timeout = pin!(sleep_until_deadline(version_deadline));

        tokio::select! {
            read = serial.read_into(&mut buf) => {
                let n = read?;
                if n == 0 {
                    sleep(response_timeout).await;
                    continue;
                }

                let mut rest = &buf[..n];
                while !rest.is_empty() {
                    let consumed = device.on_bytes_received(rest);
                    rest = &rest[consumed..];

                    while device.is_ready() {
                        match device.process_ready_frame() {
                            Ok(()) => {}
                            Err(Esp3Error::SyncByte(byte)) => {
                                warn!("Lost sync (got 0x{:02X}), waiting for the next frame", byte);
                                device.resync();
                            }
                            Err(e) if e.is_framing() => warn!("Dropped frame: {}", e),
                            Err(e) => return Err(e.into()),
                        }
                    }
                }

                for packet in device.handler_mut().packets.drain(..) {
                    packet_count += 1;

                    if version_deadline.is_some() && report_version(&packet) {
                        version_deadline = None;
                    } else {
                        log_packet(&packet);
                    }

                    if let Some(capture) = capture.as_mut() {
                        if let Err(e) = capture.record(&packet) {
                            warn!("Failed to capture packet: {}", e);
                        }
                    }
                }
            }

            _ = timeout => {
                warn!("No answer to CO_RD_VERSION within {} ms", response_timeout.as_millis());
                version_deadline = None;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                let stats = device.stats();
                info!(
                    "Packets received: {} ({} chunks, {} framing errors, {} overruns)",
                    packet_count, stats.dispatched, stats.framing_errors, stats.overruns
                );
                break;
            }
        }
    }

    Ok(())
}

/// Set up the tracing subscriber, returning the file writer guard if any
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Open the configured port, retrying until it appears or Ctrl+C is pressed
async fn open_gateway(config: &SerialConfig) -> Result<Option<GatewaySerial>> {
    let retry = Duration::from_millis(config.reconnect_interval_ms);

    loop {
        let result = if config.port.is_empty() {
            GatewaySerial::open(config.baud_rate)
        } else {
            GatewaySerial::open_with_paths(&[config.port.as_str()], config.baud_rate)
        };

        match result {
            Ok(serial) => return Ok(Some(serial)),
            Err(e) => warn!("{}, retrying in {} ms", e, retry.as_millis()),
        }

        tokio::select! {
            _ = sleep(retry) => {}
            _ = tokio::signal::ctrl_c() => return Ok(None),
        }
    }
}

/// Resolves at `deadline`, or never when there is none
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Log the answer to `CO_RD_VERSION`; `false` if `packet` is something else
fn report_version(packet: &EspPacket) -> bool {
    let Ok(response) = decode_response(packet) else {
        return false;
    };

    match decode_version(response) {
        Ok(info) => {
            info!(
                "Gateway firmware {} (API {}), chip {:08X} \"{}\"",
                info.app_version, info.api_version, info.chip_id, info.app_description
            );
            true
        }
        Err(e) => {
            warn!("Version query failed: {}", e);
            true
        }
    }
}

fn log_packet(packet: &EspPacket) {
    match packet.kind() {
        PacketType::RadioErp1 => info!(
            "Radio telegram: {} data bytes, {} optional bytes",
            packet.data_length, packet.optional_length
        ),
        PacketType::Event => info!("Event 0x{:02X}", packet.data().first().copied().unwrap_or(0)),
        kind => debug!("{:?} packet: {:02X?}", kind, packet.payload),
    }
}
