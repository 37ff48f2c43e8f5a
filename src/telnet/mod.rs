//! BrightScript telnet debugger protocol
//!
//! Client side of the line-oriented debugger the Roku debug console
//! speaks over TCP port 8085. The pipeline handles framing against the
//! prompt banner; the session layer tracks run/suspend state and parses
//! responses into typed data.

pub mod cache;
pub mod parser;
pub mod pipeline;
pub mod session;
pub mod types;

pub use pipeline::{RequestPipeline, DEBUG_PORT};
pub use session::{DebugSession, Event};
pub use types::*;
