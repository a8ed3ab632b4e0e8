//! Standard port objects wrapping the process's stdio streams.
//!
//! The buffered port layer proper lives outside this crate; bootstrap only
//! needs the three standard ports as interpreter roots, plus enough output
//! capability for `display` and `newline`.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};

use picrin_error::CoreError;
use picrin_heap::HeapObject;

use crate::error::{Raised, Result};

/// Which way a port moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A port over one of the standard streams.
pub struct Port {
    dir: Direction,
    name: &'static str,
    stream: RefCell<Stream>,
}

enum Stream {
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

impl HeapObject for Port {}

impl Port {
    pub fn standard_input() -> Port {
        Port { dir: Direction::Input, name: "stdin", stream: RefCell::new(Stream::Stdin(io::stdin())) }
    }

    pub fn standard_output() -> Port {
        Port {
            dir: Direction::Output,
            name: "stdout",
            stream: RefCell::new(Stream::Stdout(io::stdout())),
        }
    }

    pub fn standard_error() -> Port {
        Port {
            dir: Direction::Output,
            name: "stderr",
            stream: RefCell::new(Stream::Stderr(io::stderr())),
        }
    }

    pub fn direction(&self) -> Direction {
        self.dir
    }

    pub fn is_input(&self) -> bool {
        self.dir == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.dir == Direction::Output
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Write raw bytes to an output port.
    pub fn write_all(&self, bytes: &[u8]) -> Result<()> {
        match &mut *self.stream.borrow_mut() {
            Stream::Stdout(s) => s.write_all(bytes).map_err(io_raised),
            Stream::Stderr(s) => s.write_all(bytes).map_err(io_raised),
            Stream::Stdin(_) => Err(Raised::new(CoreError::TypeMismatch {
                expected: "output port",
                found: "input port",
            })),
        }
    }

    pub fn flush(&self) -> Result<()> {
        match &mut *self.stream.borrow_mut() {
            Stream::Stdout(s) => s.flush().map_err(io_raised),
            Stream::Stderr(s) => s.flush().map_err(io_raised),
            Stream::Stdin(_) => Ok(()),
        }
    }
}

fn io_raised(err: io::Error) -> Raised {
    Raised::new(CoreError::Message(format!("i/o error: {err}")))
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<port {} {:?}>", self.name, self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ports_have_expected_directions() {
        assert!(Port::standard_input().is_input());
        assert!(Port::standard_output().is_output());
        assert!(Port::standard_error().is_output());
    }

    #[test]
    fn writing_to_an_input_port_is_a_type_mismatch() {
        let port = Port::standard_input();
        let err = port.write_all(b"x").err().map(|e| e.error);
        assert_eq!(
            err,
            Some(CoreError::TypeMismatch { expected: "output port", found: "input port" })
        );
    }
}
