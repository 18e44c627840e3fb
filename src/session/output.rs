// ABOUTME: Output sink shared by the lifecycle phases and the monitoring loop
// Each call writes its full text under one lock, so lines from concurrent producers never interleave.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

struct SinkState {
    writer: Box<dyn Write + Send>,
    /// Terminal is in raw mode, so `\n` alone does not return the carriage
    raw_mode: bool,
    /// An inline progress run (`Waiting...`) is open and needs a newline
    inline_open: bool,
}

#[derive(Clone)]
pub struct OutputSink {
    state: Arc<Mutex<SinkState>>,
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

impl OutputSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                writer,
                raw_mode: false,
                inline_open: false,
            })),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Sink backed by memory, for tests and embedding.
    pub fn capture() -> (Self, CapturedOutput) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Self::new(Box::new(SharedBuffer(Arc::clone(&buffer))));
        (sink, CapturedOutput { buffer })
    }

    pub fn set_raw_mode(&self, raw_mode: bool) {
        self.lock().raw_mode = raw_mode;
    }

    /// Write one logical line. Multi-line text is written as one block.
    pub fn line(&self, text: impl AsRef<str>) {
        let mut state = self.lock();
        let ending = state.line_ending();
        let mut block = String::new();

        if state.inline_open {
            block.push_str(ending);
            state.inline_open = false;
        }

        let text = text.as_ref();
        if text.is_empty() {
            block.push_str(ending);
        }
        for line in text.lines() {
            block.push_str(line);
            block.push_str(ending);
        }

        state.write(&block);
    }

    /// Write text without ending the line, e.g. a progress marker.
    pub fn inline(&self, text: impl AsRef<str>) {
        let mut state = self.lock();
        state.inline_open = true;
        state.write(text.as_ref());
    }

    /// Close an open inline run with a line ending.
    pub fn end_inline(&self) {
        let mut state = self.lock();
        if state.inline_open {
            state.inline_open = false;
            let ending = state.line_ending();
            state.write(ending);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SinkState {
    const fn line_ending(&self) -> &'static str {
        if self.raw_mode {
            "\r\n"
        } else {
            "\n"
        }
    }

    fn write(&mut self, text: &str) {
        let result = self
            .writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush());

        if let Err(e) = result {
            warn!("Failed to write session output: {}", e);
        }
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read side of [`OutputSink::capture`].
#[derive(Clone)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect()
    }
}
