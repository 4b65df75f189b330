#![forbid(unsafe_code)]

//! Core: VT100 input decoding, events, control-sequence output, and the
//! platform-console contract.

pub mod event;
pub mod geometry;
pub mod input_parser;
mod key_table;
pub mod logging;
pub mod output;
pub mod platform;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, info, trace, warn};
