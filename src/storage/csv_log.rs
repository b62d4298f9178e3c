/// Append-only CSV log of reported readings
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};

use crate::models::LogRecord;
use crate::utils::format_datetime;

pub const CSV_HEADER: &str = "timestamp,cf,ec,tds,ph,orp,re,temp";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("CSV log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How the log file is kept from growing without bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    Unbounded,
    /// Once the file reaches `max_bytes`, the next append first drops the
    /// oldest `evict_lines` records
    SizeBounded { max_bytes: u64, evict_lines: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Rotated { evicted: usize },
}

/// Serialize a record as one newline-terminated CSV line
pub fn format_record(record: &LogRecord) -> String {
    format!(
        "{},{:.2},{:.2},{:.2},{:.2},{:.1},{},{:.1}\n",
        format_datetime(&record.time),
        record.conductivity_factor,
        record.ec,
        record.tds,
        record.ph,
        record.orp,
        record.relative_value,
        record.temperature
    )
}

#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
    policy: RotationPolicy,
    header: bool,
}

impl CsvLog {
    /// `header` adds a header row when the file is created
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy, header: bool) -> Self {
        CsvLog {
            path: path.into(),
            policy,
            header,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, evicting old records first when over the ceiling
    ///
    /// Eviction rewrites the whole file and only happens once the ceiling
    /// has been reached. Whole lines are dropped; the header row, if any,
    /// is kept.
    pub async fn append(&self, record: &LogRecord) -> Result<AppendOutcome, LogError> {
        let line = format_record(record);

        let size = match fs::metadata(&self.path).await {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(self.io_error(e)),
        };

        match (self.policy, size) {
            (
                RotationPolicy::SizeBounded {
                    max_bytes,
                    evict_lines,
                },
                Some(size),
            ) if size >= max_bytes => self.rotate(&line, evict_lines).await,
            _ => {
                self.append_line(&line, size.is_none()).await?;
                Ok(AppendOutcome::Appended)
            }
        }
    }

    async fn append_line(&self, line: &str, created: bool) -> Result<(), LogError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        let mut content = String::with_capacity(CSV_HEADER.len() + line.len() + 1);
        if created && self.header {
            content.push_str(CSV_HEADER);
            content.push('\n');
        }
        content.push_str(line);

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))
    }

    /// Stream the kept records into a sibling file, then swap it in
    ///
    /// Lines are copied as raw bytes, so a corrupted record is carried over
    /// instead of blocking every later rotation. The old file stays intact
    /// until the rename.
    async fn rotate(&self, line: &str, evict_lines: usize) -> Result<AppendOutcome, LogError> {
        let source = File::open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let temp_path = self.temp_path();
        let target = File::create(&temp_path)
            .await
            .map_err(|e| self.io_error(e))?;

        let mut reader = BufReader::new(source);
        let mut writer = BufWriter::new(target);
        let copied = copy_kept_lines(&mut reader, &mut writer, line, evict_lines).await;
        let result = match copied {
            Ok(evicted) => match writer.get_ref().sync_all().await {
                Ok(()) => fs::rename(&temp_path, &self.path).await.map(|_| evicted),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(evicted) => Ok(AppendOutcome::Rotated { evicted }),
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(self.io_error(e))
            }
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".rotate");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Copy all but the oldest `evict_lines` records, then the new line
///
/// A leading header row is copied and not counted as a record. Returns the
/// number of records dropped.
async fn copy_kept_lines<R, W>(
    reader: &mut R,
    writer: &mut W,
    line: &str,
    evict_lines: usize,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut first = true;
    let mut evicted = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let text = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let text = text.strip_suffix(b"\r").unwrap_or(text);
        let is_header = first && text == CSV_HEADER.as_bytes();
        first = false;
        if !is_header && evicted < evict_lines {
            evicted += 1;
            continue;
        }

        writer.write_all(&buf).await?;
        if !buf.ends_with(b"\n") {
            writer.write_all(b"\n").await?;
        }
    }

    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(evicted)
}
