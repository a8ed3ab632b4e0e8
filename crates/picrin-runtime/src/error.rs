//! The raised-error representation carried through the interpreter's error
//! channel: a core condition plus zero or more Scheme irritant values.

use std::fmt;

use picrin_error::CoreError;
use picrin_heap::AllocError;

use crate::value::Value;

/// Result type for runtime operations that raise through the error channel.
pub type Result<T> = std::result::Result<T, Raised>;

/// An error raised through the interpreter.
///
/// Errors propagate to the nearest rescue frame; the interpreter's error
/// slot holds the most recently raised one until it is handled or the
/// instance is closed.
#[derive(Debug, Clone)]
pub struct Raised {
    /// The condition that was raised.
    pub error: CoreError,
    /// Scheme values attached for diagnostics, possibly empty.
    pub irritants: Vec<Value>,
}

impl Raised {
    pub fn new(error: CoreError) -> Raised {
        Raised { error, irritants: Vec::new() }
    }

    pub fn with_irritants(error: CoreError, irritants: Vec<Value>) -> Raised {
        Raised { error, irritants }
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        match self.irritants.len() {
            0 => Ok(()),
            1 => write!(f, " (1 irritant)"),
            n => write!(f, " ({n} irritants)"),
        }
    }
}

impl std::error::Error for Raised {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<CoreError> for Raised {
    fn from(error: CoreError) -> Raised {
        Raised::new(error)
    }
}

impl From<AllocError> for Raised {
    fn from(err: AllocError) -> Raised {
        Raised::new(CoreError::AllocationFailed { requested: err.requested })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_irritant_count() {
        let plain = Raised::new(CoreError::EmbeddedNull);
        assert_eq!(
            plain.to_string(),
            "casting scheme string containing null character to c string"
        );

        let with = Raised::with_irritants(
            CoreError::bad_argument("make-string: negative length given"),
            vec![Value::Int(-3)],
        );
        assert_eq!(with.to_string(), "make-string: negative length given (1 irritant)");
    }
}
