//! Caller-facing back-end errors.
//!
//! Internal invariant violations (malformed IR reaching dispatch,
//! allocator contract breaches) are not represented here: they are
//! logged and abort compilation with a panic.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("invalid back-end configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("code buffer full: need {needed} bytes, {remaining} left")]
    CodeBufferFull { needed: usize, remaining: usize },

    #[error("code buffer mapping failed: {0}")]
    CodeBuffer(#[from] std::io::Error),

    #[error("exit {exit} out of range (block has {count} exits)")]
    NoSuchExit { exit: usize, count: usize },

    #[error("exit {exit} has no static target and cannot be chained")]
    NotChainable { exit: usize },

    #[error("exit {exit} leaves for 0x{expected:08x}, block starts at 0x{found:08x}")]
    TargetMismatch { exit: usize, expected: u32, found: u32 },
}

/// Result type alias for back-end operations.
pub type BackendResult<T> = Result<T, BackendError>;
