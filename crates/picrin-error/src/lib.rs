//! Error kinds surfaced by the Picrin runtime core.
//!
//! These are the conditions the runtime itself can raise: allocation
//! refusals during bootstrap, index and range violations from the string
//! primitives, type and arity mismatches from argument parsing, and the
//! embedded-NUL check on C-string conversion. Scheme-level irritant values
//! are attached one layer up, in the runtime crate, so this crate stays a
//! leaf with no knowledge of the value model.
//!
//! Bootstrap-phase failures cannot be caught from Scheme and surface as an
//! error return from `open`; everything else is raised through the
//! interpreter's error channel and propagates to the nearest rescue frame.

use thiserror::Error;

/// Result type for fallible core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// A condition raised by the runtime core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The allocator refused a request. During bootstrap this aborts `open`
    /// with no partial state; afterwards it is raised like any other error.
    #[error("out of memory: allocation of {requested} bytes failed")]
    AllocationFailed {
        /// Size of the refused request in bytes.
        requested: usize,
    },

    /// An index argument fell outside `0..len`. Signed so that negative
    /// indices report faithfully.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// A `start`/`end` pair did not satisfy `start <= end <= len`.
    #[error("invalid range [{start}, {end}) for length {len}")]
    RangeOutOfBounds { start: i64, end: i64, len: usize },

    /// A primitive received a value of the wrong kind.
    #[error("{expected} required, but got {found}")]
    TypeMismatch {
        /// Kind the primitive expected, e.g. `"string"`.
        expected: &'static str,
        /// Kind actually supplied.
        found: &'static str,
    },

    /// An argument was of the right kind but an unacceptable value.
    #[error("{0}")]
    BadArgument(String),

    /// A Scheme string containing a NUL byte was handed to the C-string
    /// conversion path.
    #[error("casting scheme string containing null character to c string")]
    EmbeddedNull,

    /// A primitive was called with too few or too many arguments.
    #[error("wrong number of arguments: required {required}, but got {got}")]
    ArityMismatch { required: usize, got: usize },

    /// An error raised from Scheme with a user-supplied message.
    #[error("{0}")]
    Message(String),
}

impl CoreError {
    /// Convenience constructor for [`CoreError::BadArgument`].
    pub fn bad_argument(message: impl Into<String>) -> CoreError {
        CoreError::BadArgument(message.into())
    }

    /// True for conditions produced by the allocator rather than by user
    /// code.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, CoreError::AllocationFailed { .. })
    }
}
