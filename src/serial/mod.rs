//! # Serial Communication Module
//!
//! Handles serial communication with the EnOcean 4 click gateway.
//!
//! This module handles:
//! - Opening the serial port at 57,600 baud (8N1)
//! - Async read/write operations
//! - Transmitting ESP3 packets
//! - Delivering received bytes to the framing engine
//! - Pulsing the module's reset line

pub mod port_trait;

use std::time::Duration;

use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Esp3Error, Result};
use crate::esp3::encoder::encode_packet;
use crate::esp3::protocol::EspPacket;
use port_trait::{SerialPortIO, TokioSerialPort};

/// ESP3 baud rate
pub const ESP3_BAUD_RATE: u32 = 57_600;

/// Default gateway device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-UART adapters
    "/dev/ttyAMA0", // Raspberry Pi header UART
    "/dev/ttyACM0", // USB CDC devices
];

/// EnOcean gateway serial port handler
pub struct GatewaySerial {
    /// Serial port handle
    port: Box<dyn SerialPortIO>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for GatewaySerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl GatewaySerial {
    /// Open connection to the gateway
    ///
    /// Auto-detects the device by trying common paths.
    ///
    /// # Errors
    ///
    /// Returns error if no gateway device can be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use enocean_gateway::serial::{GatewaySerial, ESP3_BAUD_RATE};
    ///
    /// let serial = GatewaySerial::open(ESP3_BAUD_RATE)?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(baud_rate: u32) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate)
    }

    /// Open connection to the gateway with custom device paths
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - Line speed
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Successfully opened EnOcean gateway at {}", path);
                    return Ok(Self::from_port(Box::new(TokioSerialPort::new(port)), path));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(Esp3Error::SerialPortNotFound(paths.join(", ")))
    }

    /// Wrap an already opened port
    pub fn from_port(port: Box<dyn SerialPortIO>, device_path: &str) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
        }
    }

    /// Open a specific serial port with ESP3 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| Esp3Error::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Encode and send a packet to the gateway
    ///
    /// # Errors
    ///
    /// Returns `InvalidPacketSize` for packets the encoder rejects, or a
    /// `Serial` error if writing fails.
    pub async fn send_packet(&mut self, packet: &EspPacket) -> Result<()> {
        let frame = encode_packet(packet)?;
        self.write_bytes(&frame).await?;

        debug!(
            "Sent ESP3 packet type 0x{:02X} ({} bytes)",
            packet.packet_type,
            frame.len()
        );
        Ok(())
    }

    /// Write raw bytes and flush
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .await
            .map_err(|e| Esp3Error::Serial(format!("Failed to write packet: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| Esp3Error::Serial(format!("Failed to flush serial port: {}", e)))?;

        Ok(())
    }

    /// Read available bytes into `buf`
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of bytes read; 0 when the port has nothing to give
    pub async fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.port
            .read(buf)
            .await
            .map_err(|e| Esp3Error::Serial(format!("Failed to read from serial port: {}", e)))
    }

    /// Read a single byte, `None` if none was available
    pub async fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let n = self.read_into(&mut byte).await?;
        Ok((n == 1).then_some(byte[0]))
    }

    /// Drive the reset line
    pub fn set_reset_line(&mut self, asserted: bool) -> Result<()> {
        self.port
            .set_reset_line(asserted)
            .map_err(|e| Esp3Error::Serial(format!("Failed to drive reset line: {}", e)))
    }

    /// Hold the module in reset for `duration`, then release it
    pub async fn pulse_reset(&mut self, duration: Duration) -> Result<()> {
        self.set_reset_line(true)?;
        tokio::time::sleep(duration).await;
        self.set_reset_line(false)?;

        info!("Gateway reset pulse ({} ms)", duration.as_millis());
        Ok(())
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[cfg(test)]
mod tests {
    use super::port_trait::mocks::MockSerialPort;
    use super::*;
    use crate::esp3::command::read_version;
    use crate::esp3::protocol::PacketType;
    use std::io;

    fn mock_serial() -> (MockSerialPort, GatewaySerial) {
        let mock = MockSerialPort::new();
        let serial = GatewaySerial::from_port(Box::new(mock.clone()), "/dev/mock0");
        (mock, serial)
    }

    #[test]
    fn test_constants() {
        assert_eq!(ESP3_BAUD_RATE, 57_600);
        assert_eq!(DEFAULT_DEVICE_PATHS[0], "/dev/ttyUSB0");
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = GatewaySerial::open_with_paths(invalid_paths, ESP3_BAUD_RATE);

        match result.unwrap_err() {
            Esp3Error::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = GatewaySerial::open_port("/dev/nonexistent_serial_device_12345", ESP3_BAUD_RATE);

        match result.unwrap_err() {
            Esp3Error::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_packet_writes_frame() {
        let (mock, mut serial) = mock_serial();

        serial.send_packet(&read_version()).await.unwrap();

        assert_eq!(
            mock.get_written_data(),
            vec![vec![0x55, 0x00, 0x01, 0x00, 0x05, 0x70, 0x03, 0x09]]
        );
    }

    #[tokio::test]
    async fn test_send_oversized_packet_writes_nothing() {
        let (mock, mut serial) = mock_serial();
        let packet = EspPacket::new(PacketType::RadioErp1, &[0u8; 300], &[]).unwrap();

        let result = serial.send_packet(&packet).await;

        assert!(matches!(result, Err(Esp3Error::InvalidPacketSize(300))));
        assert!(mock.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_write_error_is_reported() {
        let (mock, mut serial) = mock_serial();
        mock.set_write_error(io::ErrorKind::BrokenPipe);

        let result = serial.write_bytes(&[0x55]).await;
        assert!(matches!(result, Err(Esp3Error::Serial(msg)) if msg.contains("write")));
    }

    #[tokio::test]
    async fn test_flush_error_is_reported() {
        let (mock, mut serial) = mock_serial();
        mock.set_flush_error(io::ErrorKind::TimedOut);

        let result = serial.write_bytes(&[0x55]).await;
        assert!(matches!(result, Err(Esp3Error::Serial(msg)) if msg.contains("flush")));
    }

    #[test]
    fn test_read_byte_by_byte() {
        let (mock, mut serial) = mock_serial();
        mock.push_read_data(&[0x55, 0x00]);

        tokio_test::block_on(async {
            assert_eq!(serial.read_byte().await.unwrap(), Some(0x55));
            assert_eq!(serial.read_byte().await.unwrap(), Some(0x00));
            assert_eq!(serial.read_byte().await.unwrap(), None);
        });
    }

    #[tokio::test]
    async fn test_pulse_reset_toggles_line() {
        let (mock, mut serial) = mock_serial();

        serial.pulse_reset(Duration::from_millis(10)).await.unwrap();

        assert_eq!(mock.get_reset_line(), vec![true, false]);
        assert_eq!(serial.device_path(), "/dev/mock0");
    }

    // Integration test - only runs if gateway hardware is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_read_version_with_real_hardware() {
        if let Ok(mut serial) = GatewaySerial::open(ESP3_BAUD_RATE) {
            let send_result = serial.send_packet(&read_version()).await;
            assert!(send_result.is_ok(), "Failed to send packet: {:?}", send_result);
        } else {
            println!("No EnOcean gateway detected (skipping)");
        }
    }
}
