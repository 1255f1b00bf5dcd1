//! Compressed record output shared by all workers

use std::io::{self, BufWriter, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use zstd::stream::write::Encoder;

use crate::config::RecordEncoding;
use crate::error::{Error, Result};
use crate::record::Record;

/// Buffer between the compressor and the underlying writer
const OUTPUT_BUFFER_SIZE: usize = 32 * 4096;

/// Appends records to one zstd frame under an exclusive lock
///
/// Records are serialized before the lock is taken; only the append is serialized
/// between workers. Call [`finish`](Self::finish) once every writer is done.
pub struct OutputSink<W: Write> {
    encoding: RecordEncoding,
    encoder: Mutex<Option<Encoder<'static, BufWriter<W>>>>,
    written: AtomicU64,
}

impl<W: Write> OutputSink<W> {
    /// Start a compressed stream on `writer`
    pub fn new(writer: W, encoding: RecordEncoding, compression_level: i32) -> Result<Self> {
        let encoder = Encoder::new(
            BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, writer),
            compression_level,
        )?;
        Ok(Self {
            encoding,
            encoder: Mutex::new(Some(encoder)),
            written: AtomicU64::new(0),
        })
    }

    /// Append one record
    pub fn write(&self, record: &Record) -> Result<()> {
        let json = record.to_json()?;
        let mut guard = self
            .encoder
            .lock()
            .map_err(|_| Error::Io(io::Error::other("output sink lock poisoned")))?;
        let encoder = guard
            .as_mut()
            .ok_or_else(|| Error::Io(io::Error::other("output sink already finished")))?;

        match self.encoding {
            RecordEncoding::Ndjson => {
                encoder.write_all(&json)?;
                encoder.write_all(b"\n")?;
            }
            RecordEncoding::Framed => {
                let len = u32::try_from(json.len()).map_err(|_| {
                    Error::Integrity(format!("record of {} bytes cannot be framed", json.len()))
                })?;
                encoder.write_all(&len.to_be_bytes())?;
                encoder.write_all(&json)?;
            }
        }
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Records appended so far
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Close the zstd frame, flush and hand back the underlying writer
    pub fn finish(&self) -> Result<W> {
        let encoder = self
            .encoder
            .lock()
            .map_err(|_| Error::Io(io::Error::other("output sink lock poisoned")))?
            .take()
            .ok_or_else(|| Error::Io(io::Error::other("output sink already finished")))?;
        let buffered = encoder.finish()?;
        let writer = buffered.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        tracing::debug!(records = self.written(), "output stream closed");
        Ok(writer)
    }
}
