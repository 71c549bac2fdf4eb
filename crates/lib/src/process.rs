//! Subprocess seam between the protocol core and the operating system

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

/// Longest chunk returned by a single [`ChildProcess::read_line`] call
pub const MAX_LINE_LEN: usize = 4096;

/// A pinentry process as seen by the client.
///
/// `read_line` returns one line without its terminator, plus a flag telling
/// whether the line was cut short and continues in the next call. End of
/// stream is reported as an error of kind [`io::ErrorKind::UnexpectedEof`].
pub trait Process {
    fn start(&mut self, binary: &str, args: &[String]) -> io::Result<()>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn read_line(&mut self) -> io::Result<(Vec<u8>, bool)>;
    fn close(&mut self) -> io::Result<()>;
}

/// Pinentry running as a child process with piped stdin and stdout
#[derive(Debug, Default)]
pub struct ChildProcess {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
}

impl ChildProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// OS process id, once started
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }
}

fn not_running() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "pinentry is not running")
}

impl Process for ChildProcess {
    fn start(&mut self, binary: &str, args: &[String]) -> io::Result<()> {
        if self.child.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "pinentry already started",
            ));
        }

        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take().map(BufReader::new);
        debug!(pid = child.id(), binary, "Spawned pinentry");
        self.child = Some(child);

        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stdin = self.stdin.as_mut().ok_or_else(not_running)?;
        stdin.write_all(buf)?;
        stdin.flush()?;
        Ok(buf.len())
    }

    fn read_line(&mut self) -> io::Result<(Vec<u8>, bool)> {
        let stdout = self.stdout.as_mut().ok_or_else(not_running)?;

        let mut line = Vec::new();
        let n = stdout
            .by_ref()
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut line)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "pinentry closed its output",
            ));
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok((line, false));
        }

        // No terminator: either the chunk limit was hit or the stream ended
        let is_prefix = n == MAX_LINE_LEN;
        Ok((line, is_prefix))
    }

    fn close(&mut self) -> io::Result<()> {
        // Closing stdin lets a pinentry that ignored BYE see end of input
        drop(self.stdin.take());
        drop(self.stdout.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        debug!(?status, "pinentry exited");
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("pinentry exited with {status}")))
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            warn!(pid = child.id(), "pinentry dropped without close, killing it");
            drop(self.stdin.take());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ChildProcess {
        let mut process = ChildProcess::new();
        process
            .start("/bin/sh", &["-c".to_string(), script.to_string()])
            .unwrap();
        process
    }

    #[test]
    fn reads_lines_without_terminators() {
        let mut process = sh("printf 'OK hello\\r\\nD abc\\nlast'");

        assert_eq!(process.read_line().unwrap(), (b"OK hello".to_vec(), false));
        assert_eq!(process.read_line().unwrap(), (b"D abc".to_vec(), false));
        assert_eq!(process.read_line().unwrap(), (b"last".to_vec(), false));

        let err = process.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        process.close().unwrap();
    }

    #[test]
    fn long_lines_are_split_into_prefixes() {
        let mut process = sh("head -c 5000 /dev/zero | tr '\\0' 'x'; echo");

        let (first, more) = process.read_line().unwrap();
        assert_eq!(first.len(), MAX_LINE_LEN);
        assert!(more);

        let (rest, more) = process.read_line().unwrap();
        assert_eq!(rest.len(), 5000 - MAX_LINE_LEN);
        assert!(!more);

        process.close().unwrap();
    }

    #[test]
    fn writes_reach_the_child() {
        let mut process = sh("read line; echo \"got $line\"");

        assert_eq!(process.write(b"ping\n").unwrap(), 5);
        assert_eq!(process.read_line().unwrap(), (b"got ping".to_vec(), false));

        process.close().unwrap();
    }

    #[test]
    fn close_reports_failed_exit() {
        let mut process = sh("exit 3");
        assert!(process.close().is_err());
    }

    #[test]
    fn start_missing_binary_fails() {
        let mut process = ChildProcess::new();
        let err = process
            .start("/nonexistent/pinentry-for-tests", &[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn io_before_start_is_rejected() {
        let mut process = ChildProcess::new();
        assert_eq!(
            process.write(b"GETPIN\n").unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert_eq!(
            process.read_line().unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert!(process.close().is_ok());
    }
}
