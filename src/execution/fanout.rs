//! Fan-out writer duplicating a byte stream to several sinks.

use std::io::Write;

use crate::error::SinkError;

/// A boxed output sink.
pub type Sink = Box<dyn Write + Send>;

/// Writes every chunk, in order, to each registered sink.
///
/// A chunk either reaches every sink or the write fails at the first sink
/// that rejects it. Sinks after the failing one are not written.
#[derive(Default)]
pub struct FanOutWriter {
    sinks: Vec<(String, Sink)>,
}

impl FanOutWriter {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named sink.
    pub fn with_sink(mut self, name: impl Into<String>, sink: Sink) -> Self {
        self.push(name, sink);
        self
    }

    /// Add a named sink in place.
    pub fn push(&mut self, name: impl Into<String>, sink: Sink) {
        self.sinks.push((name.into(), sink));
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are registered.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Names of the registered sinks, in write order.
    pub fn sink_names(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(|(name, _)| name.as_str())
    }

    /// Write the whole chunk to every sink.
    ///
    /// Returns the chunk length on success. On failure no byte count is
    /// reported: the chunk must be treated as not delivered.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<usize, SinkError> {
        for (index, (name, sink)) in self.sinks.iter_mut().enumerate() {
            sink.write_all(chunk).map_err(|source| SinkError {
                sink: name.clone(),
                index,
                source,
            })?;
        }
        Ok(chunk.len())
    }

    /// Flush every sink, stopping at the first failure.
    pub fn flush_all(&mut self) -> Result<(), SinkError> {
        for (index, (name, sink)) in self.sinks.iter_mut().enumerate() {
            sink.flush().map_err(|source| SinkError {
                sink: name.clone(),
                index,
                source,
            })?;
        }
        Ok(())
    }
}

impl Write for FanOutWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_chunk(buf).map_err(std::io::Error::other)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_all().map_err(std::io::Error::other)
    }
}

impl std::fmt::Debug for FanOutWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sink_names()).finish()
    }
}
