//! # Packet Capture Module
//!
//! Writes every received logical packet to JSONL (JSON Lines) files.
//!
//! This module handles:
//! - Formatting packets as capture records
//! - Writing one record per line
//! - Starting a new file after N records

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::esp3::protocol::EspPacket;

/// One captured packet
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CaptureRecord {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub packet_type: u8,
    pub data_length: u16,
    pub optional_length: u8,
    /// Data and optional bytes as lowercase hex
    pub payload: String,
}

impl CaptureRecord {
    pub fn new(packet: &EspPacket, timestamp: DateTime<Utc>) -> Self {
        let payload = packet
            .payload
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            packet_type: packet.packet_type,
            data_length: packet.data_length,
            optional_length: packet.optional_length,
            payload,
        }
    }
}

/// Rotating JSONL capture writer
#[derive(Debug)]
pub struct CaptureLog {
    dir: PathBuf,
    max_records_per_file: usize,
    records_in_file: usize,
    writer: Option<BufWriter<File>>,
}

impl CaptureLog {
    /// Create a capture log writing into `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;

        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            max_records_per_file: max_records_per_file.max(1),
            records_in_file: 0,
            writer: None,
        })
    }

    /// Append a packet stamped with the current time
    pub fn record(&mut self, packet: &EspPacket) -> Result<()> {
        let now = Utc::now();
        self.write_record(&CaptureRecord::new(packet, now), now)
    }

    /// Append a prepared record, rotating with `now` as the new file's stamp
    pub fn write_record(&mut self, record: &CaptureRecord, now: DateTime<Utc>) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate(now)?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        self.records_in_file += 1;
        Ok(())
    }

    fn rotate(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Some(mut old) = self.writer.take() {
            old.flush()?;
        }

        let mut path = self.dir.join(format!("esp3_{}.jsonl", now.format("%Y%m%d_%H%M%S")));
        let mut suffix = 1;
        while path.exists() {
            path = self
                .dir
                .join(format!("esp3_{}_{}.jsonl", now.format("%Y%m%d_%H%M%S"), suffix));
            suffix += 1;
        }

        info!("Writing packet capture to {}", path.display());
        self.writer = Some(BufWriter::new(File::create(&path)?));
        self.records_in_file = 0;
        debug!("Capture rotated, max {} records per file", self.max_records_per_file);
        Ok(())
    }
}
