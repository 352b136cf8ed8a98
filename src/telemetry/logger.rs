//! JSONL telemetry logger with file rotation.
//!
//! Each line is one [`TelemetryRecord`]:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.123+00:00","device_id":66,"angle_h":-10,"angle_v":0,"mode":"horizontal_scan","laser_on":true}
//! ```
//!
//! Files are named `telemetry_<YYYYmmdd_HHMMSS>_<seq>.jsonl` so that name
//! order is creation order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::protocol::packet::TelemetryPacket;

const FILE_PREFIX: &str = "telemetry_";
const FILE_SUFFIX: &str = ".jsonl";

/// One logged telemetry packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339 receive time
    pub timestamp: String,
    pub device_id: u8,
    pub angle_h: i8,
    pub angle_v: i8,
    pub mode: &'static str,
    pub laser_on: bool,
}

impl TelemetryRecord {
    /// Stamp `packet` with the current time.
    #[must_use]
    pub fn now(packet: &TelemetryPacket) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            device_id: packet.device_id,
            angle_h: packet.angle_h,
            angle_v: packet.angle_v,
            mode: packet.mode.name(),
            laser_on: packet.laser_on,
        }
    }
}

/// Rotating JSONL writer
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    sequence: u32,
}

impl TelemetryLogger {
    /// Create a logger writing into `config.log_dir`, creating it if needed.
    ///
    /// No file is opened until the first record arrives.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;
        info!("Telemetry log directory: {}", dir.display());

        Ok(Self {
            dir,
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            writer: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    /// Append one packet.
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be serialized or written.
    pub fn log(&mut self, packet: &TelemetryPacket) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(&TelemetryRecord::now(packet))?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    /// Flush buffered records to disk.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying write fails.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let name = file_name(Utc::now(), self.sequence);
        self.sequence = self.sequence.wrapping_add(1);

        let path = self.dir.join(name);
        debug!("Opening telemetry log {}", path.display());
        self.writer = Some(BufWriter::new(File::create(&path)?));
        self.records_in_file = 0;

        self.prune()
    }

    /// Delete the oldest log files beyond the retention limit.
    ///
    /// File names sort in creation order.
    fn prune(&self) -> Result<()> {
        let mut files = log_files(&self.dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old telemetry log {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush telemetry log: {}", e);
        }
    }
}

/// Telemetry log files in `dir`.
fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .map(|name| {
                let name = name.to_string_lossy();
                name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX)
            })
            .unwrap_or(false);
        if is_log {
            files.push(path);
        }
    }
    Ok(files)
}

/// Log file name for `sequence`, stamped in UTC.
fn file_name(stamp: DateTime<Utc>, sequence: u32) -> String {
    format!(
        "{}{}_{:03}{}",
        FILE_PREFIX,
        stamp.format("%Y%m%d_%H%M%S"),
        sequence,
        FILE_SUFFIX
    )
}
