#![forbid(unsafe_code)]

//! Native platform consoles and the terminal facade for vtio.
//!
//! This crate implements the [`vtio_core::platform::Console`] contract for
//! the supported operating systems and composes a console, the escape
//! decoder, and the output encoder into [`Terminal`], the single object
//! interactive applications talk to.
//!
//! ## Escape Sequence Reference
//!
//! | Feature           | Enable                     | Disable                    |
//! |-------------------|----------------------------|----------------------------|
//! | Alternate screen  | `CSI ? 1049 h`             | `CSI ? 1049 l`             |
//! | Mouse reporting   | `CSI ? 1000;1003;1006;1015 h` | `CSI ? 1000;1003;1015;1006 l` |
//! | Bracketed paste   | `CSI ? 2004 h`             | `CSI ? 2004 l`             |
//! | Focus events      | `CSI ? 1004 h`             | `CSI ? 1004 l`             |
//! | Cursor show/hide  | `CSI ? 25 h`               | `CSI ? 25 l`               |

pub mod terminal;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixConsole;
#[cfg(windows)]
pub use windows::WindowsConsole;

/// The console implementation for the compiling platform.
#[cfg(unix)]
pub type NativeConsole = UnixConsole;
/// The console implementation for the compiling platform.
#[cfg(windows)]
pub type NativeConsole = WindowsConsole;

pub use terminal::{PlatformTerminal, Terminal, platform_terminal};
