//! Append-only file writer for JSON log lines.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared handle to a log file opened in append mode.
///
/// Each write is flushed immediately so lines from concurrent writers
/// are not interleaved mid-line.
#[derive(Clone)]
pub struct AppendFileWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl AppendFileWriter {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for AppendFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// MakeWriter handing out clones of one [`AppendFileWriter`].
#[derive(Clone)]
pub struct AppendFileWriterFactory {
    writer: AppendFileWriter,
}

impl AppendFileWriterFactory {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: AppendFileWriter::open(path)?,
        })
    }
}

impl<'a> MakeWriter<'a> for AppendFileWriterFactory {
    type Writer = AppendFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}
