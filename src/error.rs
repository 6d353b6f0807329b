//! Error taxonomy.
//!
//! The core is built to never crash on content errors (see the design's
//! error-handling section): a bad frame is logged and skipped, the terminal
//! is left in a valid state, and the next reactive trigger retries. Most
//! operations therefore return `Result` only where failure is a genuine
//! programmer error (dimension mismatches); per-cell and per-frame failures
//! are reported through [`Phase`] + a registered error callback instead of
//! propagating up the call stack.

use std::fmt;

/// Hard failures from the cell buffer: dimension mismatches between
/// buffers that are supposed to describe the same viewport. These are
/// programmer errors, not recoverable render-time conditions.
#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum BufferError {
    #[error("buffer dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u16, u16),
        actual: (u16, u16),
    },
}

pub type BufferResult<T> = Result<T, BufferError>;

/// Which phase of a frame an error was raised from, per the error taxonomy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Layout,
    Render,
    Key,
    Diff,
    Effect,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Layout => "layout",
            Phase::Render => "render",
            Phase::Key => "key",
            Phase::Diff => "diff",
            Phase::Effect => "effect",
        };
        f.write_str(s)
    }
}

/// A caught failure, tagged with the phase it occurred in, as delivered to
/// an error callback registered with the render loop.
#[derive(Debug, thiserror::Error)]
#[error("{phase} error: {message}")]
pub struct FrameError {
    pub phase: Phase,
    pub message: String,
}

impl FrameError {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }
}

/// Layout computation failed. Fatal for the current frame only: the loop
/// reports it via the error callback and retains the last frame's buffer.
#[derive(Debug, thiserror::Error)]
#[error("layout computation failed: {0}")]
pub struct LayoutError(pub String);
