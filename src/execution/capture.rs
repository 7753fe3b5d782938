//! Output capture for a single execution.
//!
//! Every byte the child writes to stdout lands in the combined and stdout
//! buffers, plus any configured external sinks. Stderr is routed the same
//! way into the combined and stderr buffers.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use super::fanout::{FanOutWriter, Sink};

/// Cloneable append-only byte buffer shared between writers.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A writer that panicked mid-append still leaves valid bytes behind.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Take the contents, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.lock())
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One writer shared by the stdout and stderr fan-outs.
pub struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> SharedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        // Hold the lock for the whole chunk so the two streams never split it.
        self.lock().write_all(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.lock().flush()
    }
}

/// External destinations for the child's output.
#[derive(Default)]
pub struct CaptureSinks {
    /// Extra writer receiving stdout.
    pub stdout: Option<Sink>,
    /// Extra writer receiving stderr.
    pub stderr: Option<Sink>,
    /// Tee to the calling process's own stdout/stderr.
    pub standard_streams: bool,
}

/// Captured bytes drained from a [`StreamCapture`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub combined: Vec<u8>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Combined, stdout-only and stderr-only buffers for one execution.
#[derive(Debug, Clone, Default)]
pub struct StreamCapture {
    combined: SharedBuffer,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
}

impl StreamCapture {
    /// Create empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the fan-out that receives the child's stdout.
    pub fn stdout_writer(&self, custom: Option<Sink>, standard_streams: bool) -> FanOutWriter {
        let mut writer = FanOutWriter::new()
            .with_sink("combined buffer", Box::new(self.combined.clone()))
            .with_sink("stdout buffer", Box::new(self.stdout.clone()));
        if let Some(sink) = custom {
            writer.push("custom stdout writer", sink);
        }
        if standard_streams {
            writer.push("process stdout", Box::new(std::io::stdout()));
        }
        writer
    }

    /// Build the fan-out that receives the child's stderr.
    pub fn stderr_writer(&self, custom: Option<Sink>, standard_streams: bool) -> FanOutWriter {
        let mut writer = FanOutWriter::new()
            .with_sink("combined buffer", Box::new(self.combined.clone()))
            .with_sink("stderr buffer", Box::new(self.stderr.clone()));
        if let Some(sink) = custom {
            writer.push("custom stderr writer", sink);
        }
        if standard_streams {
            writer.push("process stderr", Box::new(std::io::stderr()));
        }
        writer
    }

    /// Build both fan-outs from a set of external sinks.
    pub fn writers(&self, sinks: CaptureSinks) -> (FanOutWriter, FanOutWriter) {
        (
            self.stdout_writer(sinks.stdout, sinks.standard_streams),
            self.stderr_writer(sinks.stderr, sinks.standard_streams),
        )
    }

    /// Drain all three buffers.
    pub fn drain(&self) -> CapturedOutput {
        CapturedOutput {
            combined: self.combined.take(),
            stdout: self.stdout.take(),
            stderr: self.stderr.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdout_routes_to_combined_and_stdout() {
        let capture = StreamCapture::new();
        let (mut out, mut err) = capture.writers(CaptureSinks::default());

        out.write_chunk(b"A\n").unwrap();
        err.write_chunk(b"B\n").unwrap();

        let captured = capture.drain();
        assert_eq!(captured.combined, b"A\nB\n");
        assert_eq!(captured.stdout, b"A\n");
        assert_eq!(captured.stderr, b"B\n");
    }

    #[test]
    fn test_custom_writer_receives_copy() {
        let capture = StreamCapture::new();
        let custom = SharedBuffer::new();
        let sinks = CaptureSinks {
            stderr: Some(Box::new(custom.clone())),
            ..Default::default()
        };
        let (_, mut err) = capture.writers(sinks);

        err.write_chunk(b"stderr\n").unwrap();

        assert_eq!(custom.contents(), b"stderr\n");
        assert_eq!(capture.drain().stderr, b"stderr\n");
    }

    #[test]
    fn test_standard_streams_adds_process_sink() {
        let capture = StreamCapture::new();
        let out = capture.stdout_writer(None, true);
        let names: Vec<_> = out.sink_names().collect();
        assert_eq!(names, vec!["combined buffer", "stdout buffer", "process stdout"]);
    }

    #[test]
    fn test_drain_empties_buffers() {
        let capture = StreamCapture::new();
        let mut out = capture.stdout_writer(None, false);
        out.write_chunk(b"once").unwrap();

        assert_eq!(capture.drain().stdout, b"once");
        assert!(capture.drain().stdout.is_empty());
    }

    #[test]
    fn test_shared_writer_receives_both_streams() {
        let capture = StreamCapture::new();
        let target = SharedBuffer::new();
        let shared = SharedWriter::new(target.clone());
        let sinks = CaptureSinks {
            stdout: Some(Box::new(shared.clone())),
            stderr: Some(Box::new(shared)),
            ..Default::default()
        };
        let (mut out, mut err) = capture.writers(sinks);

        out.write_chunk(b"out ").unwrap();
        err.write_chunk(b"err").unwrap();

        assert_eq!(target.contents(), b"out err");
    }

    #[test]
    fn test_shared_buffer_clones_share_storage() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writer.write_all(b"shared").unwrap();

        assert_eq!(buffer.len(), 6);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.contents(), b"shared");
    }
}
