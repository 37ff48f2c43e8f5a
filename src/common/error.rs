//! Error types for the Roku debugger client
//!
//! The enum is `Clone` so that results can be memoized behind shared
//! futures in the response cache; I/O sources are kept behind an `Arc`
//! for that reason.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the debugger client
#[derive(Error, Debug, Clone)]
pub enum Error {
    // === Connection Errors ===
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("Connection to the device was closed")]
    ConnectionClosed,

    #[error("Pipeline was destroyed while the command was outstanding")]
    PipelineDestroyed,

    // === Protocol Parse Errors ===
    #[error("Response to '{command}' did not match the expected shape")]
    UnrecognizedResponse { command: String },

    #[error("Unable to parse BrightScript {kind} for '{expression}': dump never reached its closing '{delimiter}'")]
    UnterminatedDump {
        kind: &'static str,
        expression: String,
        delimiter: char,
    },

    #[error("Malformed {kind} entry: '{line}'")]
    MalformedDumpLine { kind: &'static str, line: String },

    #[error("Could not determine the type of '{0}'")]
    UnknownType(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a connection failure from the underlying socket error
    pub fn connect_failed(host: &str, port: u16, source: io::Error) -> Self {
        Self::ConnectFailed {
            host: host.to_string(),
            port,
            source: Arc::new(source),
        }
    }

    /// Create an unrecognized-response error for the given command
    pub fn unrecognized_response(command: &str) -> Self {
        Self::UnrecognizedResponse {
            command: command.to_string(),
        }
    }

    /// Create an unterminated-dump error for an object or array dump
    pub fn unterminated_dump(kind: &'static str, expression: &str, delimiter: char) -> Self {
        Self::UnterminatedDump {
            kind,
            expression: expression.to_string(),
            delimiter,
        }
    }
}
