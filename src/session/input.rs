// ABOUTME: Terminal key source for the cancellation listener
// Lazy: raw mode and the reader thread start on first poll and stop when the stream is dropped.

use super::OutputSink;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::io::{self, IsTerminal, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

// How long the reader thread blocks per poll before re-checking for shutdown
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct TerminalInput {
    output: OutputSink,
}

impl TerminalInput {
    /// `output` is switched to raw-mode line endings while keys are being read.
    pub const fn new(output: OutputSink) -> Self {
        Self { output }
    }

    pub fn into_keys(self) -> BoxStream<'static, KeyEvent> {
        let output = self.output;

        async_stream::stream! {
            if io::stdin().is_terminal() {
                match KeyReader::start(output) {
                    Ok(mut reader) => {
                        while let Some(key_event) = reader.keys.recv().await {
                            yield key_event;
                        }
                    }
                    Err(e) => warn!("Cannot read keys from terminal: {}", e),
                }
            } else {
                // Not a TTY (piped or scripted): every byte on stdin is a key press
                let mut keys = keys_from_reader(io::stdin());
                while let Some(key_event) = keys.next().await {
                    yield key_event;
                }
            }
        }
        .boxed()
    }
}

/// Key stream over a byte source, one `KeyCode::Char` per byte. Ends at EOF.
///
/// Reads happen on a detached thread: a blocking read on an idle pipe cannot
/// be cancelled, and must not hold up runtime shutdown once the stream is dropped.
pub fn keys_from_reader<R>(reader: R) -> BoxStream<'static, KeyEvent>
where
    R: Read + Send + 'static,
{
    let (tx, mut keys) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || read_bytes(reader, &tx));

    if let Err(e) = spawned {
        warn!("Cannot start stdin reader: {}", e);
        return stream::empty().boxed();
    }

    async_stream::stream! {
        while let Some(key_event) = keys.recv().await {
            yield key_event;
        }
    }
    .boxed()
}

fn read_bytes<R: Read>(mut reader: R, tx: &mpsc::UnboundedSender<KeyEvent>) {
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for &byte in &buf[..n] {
                    let key_event = KeyEvent::new(KeyCode::Char(char::from(byte)), KeyModifiers::NONE);
                    if tx.send(key_event).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
    debug!("Stdin reader finished");
}

/// Raw-mode key reader. Dropping it restores the terminal.
struct KeyReader {
    keys: mpsc::UnboundedReceiver<KeyEvent>,
    stop: Arc<AtomicBool>,
    output: OutputSink,
}

impl KeyReader {
    fn start(output: OutputSink) -> io::Result<Self> {
        enable_raw_mode()?;
        output.set_raw_mode(true);

        let (tx, keys) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let spawned = std::thread::Builder::new()
            .name("key-reader".to_string())
            .spawn(move || read_keys(&tx, &thread_stop));

        if let Err(e) = spawned {
            let _ = disable_raw_mode();
            output.set_raw_mode(false);
            return Err(e);
        }

        debug!("Terminal key reader started");
        Ok(Self { keys, stop, output })
    }
}

impl Drop for KeyReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = disable_raw_mode();
        self.output.set_raw_mode(false);
        debug!("Terminal key reader stopped");
    }
}

fn read_keys(tx: &mpsc::UnboundedSender<KeyEvent>, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match event::poll(READ_POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key_event)) => {
                    if tx.send(key_event).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read terminal event: {}", e);
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to poll terminal events: {}", e);
                break;
            }
        }
    }
}
