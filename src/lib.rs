//! Roku telnet debugger client
//!
//! This library speaks the interactive, line-oriented debugger protocol
//! that Roku devices expose over TCP, turning the unframed text stream
//! into typed request/response operations plus suspend, compile-error,
//! and close notifications.

pub mod cli;
pub mod common;
pub mod telnet;

// Re-export commonly used types
pub use common::{Error, Result};
pub use telnet::{DebugSession, EvaluateContainer, Event, StackFrame, Thread};
