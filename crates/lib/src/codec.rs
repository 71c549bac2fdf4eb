use std::io;

use thiserror::Error;
use tracing::trace;

use crate::process::Process;

/// Line framing errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("pinentry closed the connection")]
    Closed,
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("response is not valid UTF-8")]
    InvalidUtf8,
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::Closed
        } else {
            TransportError::Io(e)
        }
    }
}

/// Whether a received line carries no protocol content
pub fn is_ignorable(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}

/// Newline framing over a [`Process`]
#[derive(Debug)]
pub struct LineTransport<P> {
    process: P,
}

impl<P: Process> LineTransport<P> {
    pub fn new(process: P) -> Self {
        Self { process }
    }

    pub fn process_mut(&mut self) -> &mut P {
        &mut self.process
    }

    pub fn into_inner(self) -> P {
        self.process
    }

    /// Write one line, appending the newline
    pub fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let written = self.process.write(&buf)?;
        if written != buf.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: buf.len(),
            });
        }
        Ok(())
    }

    /// Read the next line that is neither blank nor a comment
    pub fn read_line(&mut self) -> Result<String, TransportError> {
        loop {
            let line = self.read_full_line()?;
            if is_ignorable(&line) {
                trace!(?line, "Skipping line");
                continue;
            }
            return Ok(line);
        }
    }

    /// Read one logical line, joining prefix continuations
    fn read_full_line(&mut self) -> Result<String, TransportError> {
        let mut bytes = Vec::new();
        loop {
            let (chunk, is_prefix) = self.process.read_line()?;
            bytes.extend_from_slice(&chunk);
            if !is_prefix {
                break;
            }
        }
        // A CRLF split across chunks leaves the CR behind
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8(bytes).map_err(|_| TransportError::InvalidUtf8)
    }
}
