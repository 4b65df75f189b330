#![forbid(unsafe_code)]

//! Windows console: raw mode and size queries via crossterm (which
//! enables virtual-terminal input, so the console delivers VT byte
//! sequences), a dedicated reader thread blocking on console input, and
//! a decode loop fed through a channel.
//!
//! The reader thread never touches decoder state: it only hands byte
//! batches to the decode loop. After cancellation it may stay blocked in
//! one last console read until the next input arrives; it observes the
//! flag immediately afterwards and exits, so it is detached rather than
//! joined. The console has no SIGWINCH equivalent reachable from a byte
//! stream, so the decode loop polls the reported size on each wake-up
//! and synthesizes [`Event::Resize`] on change.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use vtio_core::event::Event;
use vtio_core::geometry::Size;
use vtio_core::input_parser::ESCAPE_TIMEOUT;
use vtio_core::platform::{lock_parser, Console, EventHandler, SharedParser};

/// Upper bound on one channel wait; bounds resize-poll and cancellation
/// latency.
const WAKE_INTERVAL: Duration = Duration::from_millis(50);

/// Read chunk size for the console reader thread.
const READ_BUF_LEN: usize = 1024;

/// Windows implementation of the [`Console`] contract.
pub struct WindowsConsole {
    raw_mode_active: bool,
    input: Option<InputLoop>,
}

impl WindowsConsole {
    /// Create a console with no terminal state touched yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw_mode_active: false,
            input: None,
        }
    }
}

impl Default for WindowsConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for WindowsConsole {
    fn raw_mode(&mut self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        self.raw_mode_active = true;
        #[cfg(feature = "tracing")]
        tracing::info!("console raw mode enabled");
        Ok(())
    }

    fn restore_console(&mut self) -> io::Result<()> {
        if !self.raw_mode_active {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "raw_mode() was never called",
            ));
        }
        crossterm::terminal::disable_raw_mode()?;
        self.raw_mode_active = false;
        #[cfg(feature = "tracing")]
        tracing::info!("console raw mode restored");
        Ok(())
    }

    fn attach(&mut self, parser: SharedParser, handler: EventHandler) -> io::Result<()> {
        if self.input.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "input loop already attached",
            ));
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        std::thread::Builder::new().name("vtio-stdin".into()).spawn({
            let cancel = Arc::clone(&cancel);
            move || run_reader(tx, cancel)
        })?;

        let decode_thread = std::thread::Builder::new()
            .name("vtio-input".into())
            .spawn({
                let cancel = Arc::clone(&cancel);
                move || run_decode_loop(rx, parser, handler, cancel)
            })?;

        self.input = Some(InputLoop {
            cancel,
            decode_thread: Some(decode_thread),
        });
        #[cfg(feature = "tracing")]
        tracing::info!("input loop attached");
        Ok(())
    }

    fn unattach(&mut self) {
        let Some(mut input) = self.input.take() else {
            return;
        };
        input.cancel.store(true, Ordering::SeqCst);
        if let Some(thread) = input.decode_thread.take() {
            let _ = thread.join();
        }
        #[cfg(feature = "tracing")]
        tracing::info!("input loop detached");
    }

    fn size(&self) -> io::Result<Size> {
        let (width, height) = crossterm::terminal::size()?;
        Ok(Size::new(width, height))
    }
}

impl Drop for WindowsConsole {
    fn drop(&mut self) {
        self.unattach();
        // Best-effort restore; errors during cleanup are ignored.
        if self.raw_mode_active {
            let _ = crossterm::terminal::disable_raw_mode();
            self.raw_mode_active = false;
        }
    }
}

/// Handle to the running input loop. The reader thread is detached; only
/// the decode thread is joined on unattach.
struct InputLoop {
    cancel: Arc<AtomicBool>,
    decode_thread: Option<JoinHandle<()>>,
}

/// Byte batches handed from the reader thread to the decode loop.
enum ReaderMessage {
    Data(Vec<u8>),
    Closed,
}

/// Blocking console reader. Sends whatever bytes each read returns.
fn run_reader(tx: Sender<ReaderMessage>, cancel: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut buf = [0u8; READ_BUF_LEN];

    while !cancel.load(Ordering::SeqCst) {
        match stdin.lock().read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(ReaderMessage::Closed);
                break;
            }
            Ok(n) => {
                if tx.send(ReaderMessage::Data(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(_) => {
                let _ = tx.send(ReaderMessage::Closed);
                break;
            }
        }
    }
}

/// The decode loop: feeds received bytes to the shared decoder, finalizes
/// pending escapes on timeout, and synthesizes resize events from size
/// polling.
fn run_decode_loop(
    rx: Receiver<ReaderMessage>,
    parser: SharedParser,
    mut handler: EventHandler,
    cancel: Arc<AtomicBool>,
) {
    let mut deadline: Option<Instant> = None;
    let mut last_size = crossterm::terminal::size().ok();

    while !cancel.load(Ordering::SeqCst) {
        if let Ok(size) = crossterm::terminal::size() {
            if last_size != Some(size) {
                last_size = Some(size);
                lock_parser(&parser).push_event(Event::Resize(Size::new(size.0, size.1)));
                drain_and_deliver(&parser, &mut handler);
            }
        }

        let timeout = match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()).min(WAKE_INTERVAL),
            None => WAKE_INTERVAL,
        };

        match rx.recv_timeout(timeout) {
            Ok(ReaderMessage::Data(bytes)) => {
                deadline = {
                    let mut guard = lock_parser(&parser);
                    guard.feed(&bytes);
                    (!guard.is_idle()).then(|| Instant::now() + ESCAPE_TIMEOUT)
                };
                drain_and_deliver(&parser, &mut handler);
            }
            Ok(ReaderMessage::Closed) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        deadline = None;
                        lock_parser(&parser).finalize_pending();
                        drain_and_deliver(&parser, &mut handler);
                    }
                }
            }
        }
    }
}

/// Drain decoded events and hand them to the handler outside the lock.
fn drain_and_deliver(parser: &SharedParser, handler: &mut EventHandler) {
    let events = lock_parser(parser).take_events();
    if !events.is_empty() {
        handler(events);
    }
}
