#![forbid(unsafe_code)]

//! Unix console: termios raw mode on `/dev/tty`, a polling input loop,
//! and SIGWINCH-driven resize events.
//!
//! The input loop runs on a dedicated thread. It polls the tty fd with a
//! bounded timeout that doubles as the escape-completion timer: when the
//! timeout fires with the decoder outside ground state, the pending
//! escape is finalized and the resulting events are delivered. That is the only
//! path by which events reach the handler without new input. SIGWINCH is
//! observed on a separate signal thread that only signals through a
//! channel, never touching decoder state.

use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nix::sys::termios::{self, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use signal_hook::consts::signal::SIGWINCH;
use signal_hook::iterator::Signals;

use vtio_core::event::Event;
use vtio_core::geometry::Size;
use vtio_core::input_parser::ESCAPE_TIMEOUT;
use vtio_core::platform::{lock_parser, Console, EventHandler, SharedParser};

/// Upper bound on one poll wait; bounds resize and cancellation latency.
const WAKE_INTERVAL: Duration = Duration::from_millis(50);

/// Read chunk size for draining available tty bytes.
const READ_BUF_LEN: usize = 1024;

const DEV_TTY: &str = "/dev/tty";

/// Unix implementation of the [`Console`] contract.
pub struct UnixConsole {
    /// Termios saved by `raw_mode`, restored by `restore_console`; the
    /// file handle keeps the fd the settings were read from.
    saved: Option<(File, Termios)>,
    /// Running input loop, if attached.
    input: Option<InputLoop>,
    /// Test hook: read from this handle instead of `/dev/tty`.
    reader_override: Option<File>,
}

impl UnixConsole {
    /// Create a console with no terminal state touched yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            saved: None,
            input: None,
            reader_override: None,
        }
    }

    /// Create a console whose input loop reads from `reader` instead of
    /// `/dev/tty` (no resize signals, no real terminal needed).
    #[cfg(test)]
    fn from_reader(reader: File) -> Self {
        Self {
            saved: None,
            input: None,
            reader_override: Some(reader),
        }
    }
}

impl Default for UnixConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for UnixConsole {
    fn raw_mode(&mut self) -> io::Result<()> {
        let tty = File::open(DEV_TTY)?;
        let original = termios::tcgetattr(&tty).map_err(io::Error::other)?;

        let mut raw = original.clone();
        raw.local_flags &=
            !(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::IEXTEN | LocalFlags::ISIG);
        raw.input_flags &= !(InputFlags::IXON
            | InputFlags::IXOFF
            | InputFlags::ICRNL
            | InputFlags::INLCR
            | InputFlags::IGNCR);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        termios::tcsetattr(&tty, SetArg::TCSANOW, &raw).map_err(io::Error::other)?;

        self.saved = Some((tty, original));
        #[cfg(feature = "tracing")]
        tracing::info!("terminal raw mode enabled");
        Ok(())
    }

    fn restore_console(&mut self) -> io::Result<()> {
        let (tty, original) = self.saved.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "raw_mode() was never called")
        })?;
        termios::tcsetattr(&tty, SetArg::TCSANOW, &original).map_err(io::Error::other)?;
        #[cfg(feature = "tracing")]
        tracing::info!("terminal raw mode restored");
        Ok(())
    }

    fn attach(&mut self, parser: SharedParser, handler: EventHandler) -> io::Result<()> {
        if self.input.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "input loop already attached",
            ));
        }

        let (reader, resize_guard, resize_rx) = match self.reader_override.take() {
            Some(reader) => (reader, None, None),
            None => {
                let tty = File::open(DEV_TTY)?;
                // Coalesce signal storms: one pending notification is
                // enough since the authoritative size is queried when the
                // event is generated.
                let (tx, rx) = mpsc::sync_channel(1);
                match ResizeSignalGuard::new(tx) {
                    Ok(guard) => (tty, Some(guard), Some(rx)),
                    Err(_) => (tty, None, None),
                }
            }
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let thread = std::thread::Builder::new()
            .name("vtio-input".into())
            .spawn({
                let cancel = Arc::clone(&cancel);
                move || run_input_loop(reader, parser, handler, cancel, resize_rx)
            })?;

        self.input = Some(InputLoop {
            cancel,
            thread: Some(thread),
            _resize_guard: resize_guard,
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
        input._resize_guard.take();
        if let Some(thread) = input.thread.take() {
            let _ = thread.join();
        }
        #[cfg(feature = "tracing")]
        tracing::info!("input loop detached");
    }

    fn size(&self) -> io::Result<Size> {
        match &self.saved {
            Some((tty, _)) => query_size(tty),
            None => query_size(&File::open(DEV_TTY)?),
        }
    }
}

impl Drop for UnixConsole {
    fn drop(&mut self) {
        self.unattach();
        // Best-effort restore; errors during cleanup are ignored.
        if let Some((tty, original)) = self.saved.take() {
            let _ = termios::tcsetattr(&tty, SetArg::TCSANOW, &original);
        }
    }
}

/// Handle to the running input loop.
struct InputLoop {
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    _resize_guard: Option<ResizeSignalGuard>,
}

/// Owns the SIGWINCH handler thread; closing the handle stops it.
struct ResizeSignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

impl ResizeSignalGuard {
    fn new(tx: mpsc::SyncSender<()>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for _ in signals.forever() {
                let _ = tx.try_send(());
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for ResizeSignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The read-and-decode loop. Owns the handler; all decoder access goes
/// through the shared lock, and the handler runs with the lock released.
fn run_input_loop(
    mut reader: File,
    parser: SharedParser,
    mut handler: EventHandler,
    cancel: Arc<AtomicBool>,
    resize_rx: Option<mpsc::Receiver<()>>,
) {
    let mut deadline: Option<Instant> = None;

    while !cancel.load(Ordering::SeqCst) {
        if let Some(rx) = &resize_rx {
            if rx.try_recv().is_ok() {
                if let Ok(size) = query_size(&reader) {
                    lock_parser(&parser).push_event(Event::Resize(size));
                    drain_and_deliver(&parser, &mut handler);
                }
            }
        }

        let timeout = match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()).min(WAKE_INTERVAL),
            None => WAKE_INTERVAL,
        };

        match poll_readable(&reader, timeout) {
            Ok(true) => {
                let mut buf = [0u8; READ_BUF_LEN];
                match reader.read(&mut buf) {
                    // EOF: the peer is gone, nothing further to decode.
                    Ok(0) => break,
                    Ok(n) => {
                        deadline = {
                            let mut guard = lock_parser(&parser);
                            guard.feed(&buf[..n]);
                            (!guard.is_idle()).then(|| Instant::now() + ESCAPE_TIMEOUT)
                        };
                        drain_and_deliver(&parser, &mut handler);
                    }
                    Err(e)
                        if e.kind() == io::ErrorKind::Interrupted
                            || e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("tty read failed, stopping input loop: {_e}");
                        break;
                    }
                }
            }
            Ok(false) => {
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        deadline = None;
                        lock_parser(&parser).finalize_pending();
                        drain_and_deliver(&parser, &mut handler);
                    }
                }
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("tty poll failed, stopping input loop: {_e}");
                break;
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

/// Wait for the fd to become readable, up to `timeout`.
fn poll_readable(reader: &File, timeout: Duration) -> io::Result<bool> {
    use std::os::fd::AsFd;

    let mut poll_fds = [nix::poll::PollFd::new(
        reader.as_fd(),
        nix::poll::PollFlags::POLLIN,
    )];
    let timeout_ms: u16 = timeout.as_millis().try_into().unwrap_or(u16::MAX);
    match nix::poll::poll(&mut poll_fds, nix::poll::PollTimeout::from(timeout_ms)) {
        Ok(n) => Ok(n > 0),
        Err(nix::errno::Errno::EINTR) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

/// Current window size of the fd, via `TIOCGWINSZ`.
fn query_size(tty: &File) -> io::Result<Size> {
    let ws = rustix::termios::tcgetwinsize(tty)?;
    Ok(Size::new(ws.ws_col, ws.ws_row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use vtio_core::event::{FocusChange, Key, KeyEvent};
    use vtio_core::input_parser::InputParser;

    /// Create a (reader_file, writer_stream) pair using Unix sockets.
    fn pipe_pair() -> (File, std::os::unix::net::UnixStream) {
        use std::os::unix::net::UnixStream;
        let (a, b) = UnixStream::pair().unwrap();
        let reader: File = std::os::fd::OwnedFd::from(a).into();
        (reader, b)
    }

    fn shared_parser() -> SharedParser {
        Arc::new(Mutex::new(InputParser::new()))
    }

    fn collector() -> (Arc<Mutex<Vec<Event>>>, EventHandler) {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let handler: EventHandler = Box::new(move |events| {
            sink.lock().unwrap().extend(events);
        });
        (collected, handler)
    }

    fn wait_until(collected: &Arc<Mutex<Vec<Event>>>, count: usize) -> Vec<Event> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            {
                let events = collected.lock().unwrap();
                if events.len() >= count {
                    return events.clone();
                }
            }
            assert!(Instant::now() < deadline, "timed out waiting for events");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn attach_delivers_key_events() {
        let (reader, mut writer) = pipe_pair();
        let mut console = UnixConsole::from_reader(reader);
        let (collected, handler) = collector();

        console.attach(shared_parser(), handler).unwrap();
        writer.write_all(b"abc").unwrap();

        let events = wait_until(&collected, 3);
        assert_eq!(
            events,
            vec![
                Event::Key(KeyEvent::new(Key::Char('a'))),
                Event::Key(KeyEvent::new(Key::Char('b'))),
                Event::Key(KeyEvent::new(Key::Char('c'))),
            ]
        );
        console.unattach();
    }

    #[test]
    fn attach_delivers_complete_sequences() {
        let (reader, mut writer) = pipe_pair();
        let mut console = UnixConsole::from_reader(reader);
        let (collected, handler) = collector();

        console.attach(shared_parser(), handler).unwrap();
        writer.write_all(b"\x1b[A\x1b[I").unwrap();

        let events = wait_until(&collected, 2);
        assert_eq!(
            events,
            vec![
                Event::Key(KeyEvent::new(Key::Up)),
                Event::Focus(FocusChange::Gained),
            ]
        );
        console.unattach();
    }

    #[test]
    fn lone_escape_is_delivered_after_timeout() {
        let (reader, mut writer) = pipe_pair();
        let mut console = UnixConsole::from_reader(reader);
        let (collected, handler) = collector();

        console.attach(shared_parser(), handler).unwrap();
        writer.write_all(b"\x1b").unwrap();

        // No further input: only the escape timeout can produce this event.
        let events = wait_until(&collected, 1);
        assert_eq!(events, vec![Event::Key(KeyEvent::new(Key::Escape))]);
        console.unattach();
    }

    #[test]
    fn unattach_stops_delivery() {
        let (reader, mut writer) = pipe_pair();
        let mut console = UnixConsole::from_reader(reader);
        let (collected, handler) = collector();

        console.attach(shared_parser(), handler).unwrap();
        writer.write_all(b"x").unwrap();
        wait_until(&collected, 1);

        console.unattach();
        writer.write_all(b"y").unwrap();
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(collected.lock().unwrap().len(), 1);
    }

    #[test]
    fn double_attach_is_rejected() {
        let (reader, _writer) = pipe_pair();
        let mut console = UnixConsole::from_reader(reader);
        let (_, handler) = collector();
        console.attach(shared_parser(), handler).unwrap();

        let (_, handler) = collector();
        assert!(console.attach(shared_parser(), handler).is_err());
        console.unattach();
    }

    #[test]
    fn restore_without_raw_mode_errors() {
        let mut console = UnixConsole::new();
        assert!(console.restore_console().is_err());
    }
}
