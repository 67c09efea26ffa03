//! Local persistence of framed records.
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Destination accepting one text line at a time.
pub trait RecordSink {
    /// Append `line` followed by a newline.
    fn append_line(&mut self, line: &[u8]) -> io::Result<()>;
}

/// Appends lines to a file, opening and closing it for every record.
///
/// Nothing is held open between records, so a power cut can at worst lose the
/// line being written.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Prepare a sink writing to `path`, creating missing parent directories.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::info!("File sink will append to '{}'.", path.display());
        Ok(Self { path })
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

impl RecordSink for FileSink {
    fn append_line(&mut self, line: &[u8]) -> io::Result<()> {
        let mut file = self.open()?;
        file.write_all(line)?;
        file.write_all(b"\n")?;
        file.flush()
    }
}

/// Collects lines in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    /// Lines appended so far, without newlines.
    pub lines: Vec<Vec<u8>>,
}

impl RecordSink for MemorySink {
    fn append_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.lines.push(line.to_vec());
        Ok(())
    }
}
