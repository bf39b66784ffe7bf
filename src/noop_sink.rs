use std::io;

use crate::sink::LogSink;

/// A sink that simply drops all entries.
///
/// Useful for measuring the overhead of the handler itself without any
/// I/O, and for tests that don't care about output.
#[derive(Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn write(&self, _entry: &[u8]) -> io::Result<()> {
        Ok(())
    }
}
