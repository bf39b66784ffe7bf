use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Destination for serialized entries produced by the handler.
///
/// `write` receives one complete entry per call (a full JSON document
/// plus trailing newline) and must keep those bytes contiguous when
/// called from multiple threads. Implementations decide whether that
/// requires a lock; the handler adds none of its own, so the CPU-bound
/// entry assembly never contends on the sink.
pub trait LogSink: Send + Sync {
    /// Write a single serialized entry.
    ///
    /// **Returns**
    /// - `Ok(())` if the sink accepted all bytes.
    /// - `Err(..)` on failure; the handler propagates it unchanged and
    ///   never retries.
    fn write(&self, entry: &[u8]) -> io::Result<()>;
}

/// Adapter exposing any [`io::Write`] as a [`LogSink`].
///
/// The mutex is scoped to the single write call, which is all that is
/// needed to keep one entry's bytes contiguous.
pub struct WriterSink<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> WriterSink<W> {
        WriterSink {
            inner: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write(&self, entry: &[u8]) -> io::Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink poisoned"))?;

        writer.write_all(entry)
    }
}

/// Sink writing to the process standard output.
pub fn stdout() -> Arc<dyn LogSink> {
    Arc::new(WriterSink::new(io::stdout()))
}

/// Sink writing to the process standard error.
pub fn stderr() -> Arc<dyn LogSink> {
    Arc::new(WriterSink::new(io::stderr()))
}

/// In-memory sink that retains everything written to it. Meant for
/// tests and demos that assert on the serialized output.
#[derive(Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferSink {
    pub fn new() -> BufferSink {
        BufferSink::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// The captured output split into entry lines.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.contents())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl LogSink for BufferSink {
    fn write(&self, entry: &[u8]) -> io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink poisoned"))?;

        buffer.extend_from_slice(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_sink_appends() {
        let sink = BufferSink::new();
        sink.write(b"{}\n").expect("write");
        sink.write(b"{\"a\":1}\n").expect("write");

        assert_eq!(sink.lines(), vec!["{}", "{\"a\":1}"]);
    }
}
