#![forbid(unsafe_code)]

//! The contract the decoder requires from a platform console.
//!
//! One implementation exists per operating system; a trivial factory in
//! the platform crate picks the right one at startup. Implementations
//! never touch decoder internals directly; they feed it through
//! [`InputParser::feed`](crate::input_parser::InputParser::feed) and
//! friends while holding the shared lock, and invoke the event handler
//! with the lock released.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::event::Event;
use crate::geometry::Size;
use crate::input_parser::InputParser;

/// The decoder instance shared between the caller and the input loop.
///
/// The mutex is the Rust rendition of the single-writer rule: at any
/// moment exactly one thread is running decoder methods.
pub type SharedParser = Arc<Mutex<InputParser>>;

/// Callback receiving each batch of decoded events.
///
/// Owned by the input loop and invoked from its thread; after
/// [`Console::unattach`] returns it is dropped and never called again.
pub type EventHandler = Box<dyn FnMut(Vec<Event>) + Send>;

/// Lock the shared decoder, recovering from a poisoned lock. A handler
/// that panicked must not wedge input parsing for the rest of the
/// session.
pub fn lock_parser(parser: &SharedParser) -> MutexGuard<'_, InputParser> {
    parser.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Platform-specific console control.
///
/// # Contract
///
/// - [`raw_mode`](Self::raw_mode) must be called once before any other
///   operation; calling other operations first is a programmer error with
///   undefined results.
/// - [`restore_console`](Self::restore_console) exactly reverses
///   [`raw_mode`](Self::raw_mode); calling it without a prior
///   [`raw_mode`](Self::raw_mode) is likewise undefined.
/// - After [`attach`](Self::attach), the implementation reads terminal
///   bytes whenever they are available, feeds them to the shared decoder,
///   delivers each resulting batch to the handler, finalizes pending
///   escapes on timeout, and synthesizes [`Event::Resize`] for terminal
///   size changes.
/// - [`unattach`](Self::unattach) stops all listening before returning.
pub trait Console {
    /// Put the terminal into raw mode: no echo, no canonical line
    /// buffering, no signal-generating keys, no input translation. The
    /// prior settings are saved for [`restore_console`](Self::restore_console).
    fn raw_mode(&mut self) -> io::Result<()>;

    /// Restore the settings saved by [`raw_mode`](Self::raw_mode).
    fn restore_console(&mut self) -> io::Result<()>;

    /// Start the input loop, delivering decoded event batches to
    /// `handler`.
    fn attach(&mut self, parser: SharedParser, handler: EventHandler) -> io::Result<()>;

    /// Stop the input loop. No handler invocation happens after this
    /// returns.
    fn unattach(&mut self);

    /// Current terminal dimensions.
    fn size(&self) -> io::Result<Size>;
}
