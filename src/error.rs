// error.rs - Error type shared by both engines

use std::io;

use thiserror::Error;

/// Every condition the crate detects. None of them is recovered from: the
/// run that produced one is abandoned.
#[derive(Debug, Error)]
pub enum Error {
    /// `]` with no open loop.
    #[error("unmatched ']' at byte {offset}")]
    UnmatchedClose { offset: usize },

    /// `[` still open at the end of the program (code generation only).
    #[error("unclosed '[' at byte {offset}")]
    UnclosedLoop { offset: usize },

    #[error("loop nesting exceeds {limit} at byte {offset}")]
    NestingTooDeep { limit: usize, offset: usize },

    /// Only raised when the tape runs in strict cursor mode.
    #[error("cursor {cursor} moved by {delta} leaves a tape of {capacity} cells")]
    CursorOutOfRange {
        cursor: usize,
        delta: isize,
        capacity: usize,
    },

    /// A branch displacement does not fit in 32 bits.
    #[error("generated code too large ({size} bytes) for 32-bit branches")]
    CodeTooLarge { size: usize },

    #[error("executable memory {op} failed: {source}")]
    ExecMemory {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("generated code cannot run on {triple} (x86_64 Linux only)")]
    UnsupportedHost { triple: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
