//! Scripted [`Process`] double for tests

use std::collections::VecDeque;
use std::io;

use crate::process::Process;

#[derive(Debug)]
enum Expect {
    Start {
        binary: String,
        args: Vec<String>,
        fail: bool,
    },
    Write {
        line: String,
        result: io::Result<usize>,
    },
    ReadLine(io::Result<(Vec<u8>, bool)>),
    Close(io::Result<()>),
}

/// Process that replays an ordered script and panics on any deviation.
///
/// Every expectation must be consumed before the mock is dropped.
#[derive(Debug, Default)]
pub struct MockProcess {
    script: VecDeque<Expect>,
}

impl MockProcess {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, expect: Expect) -> Self {
        self.script.push_back(expect);
        self
    }

    /// Expect a start, followed by the usual greeting
    pub fn expect_start(self, binary: &str, args: &[&str]) -> Self {
        self.expect_start_only(binary, args)
            .expect_read_line("OK Pleased to meet you")
    }

    pub fn expect_start_only(self, binary: &str, args: &[&str]) -> Self {
        self.push(Expect::Start {
            binary: binary.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            fail: false,
        })
    }

    pub fn expect_start_failure(self, binary: &str) -> Self {
        self.push(Expect::Start {
            binary: binary.to_string(),
            args: Vec::new(),
            fail: true,
        })
    }

    pub fn expect_writeln(self, line: &str) -> Self {
        let len = line.len() + 1;
        self.push(Expect::Write {
            line: line.to_string(),
            result: Ok(len),
        })
    }

    pub fn expect_writeln_ok(self, line: &str) -> Self {
        self.expect_writeln(line).expect_read_line("OK")
    }

    pub fn expect_short_write(self, line: &str, written: usize) -> Self {
        self.push(Expect::Write {
            line: line.to_string(),
            result: Ok(written),
        })
    }

    pub fn expect_write_error(self, line: &str, kind: io::ErrorKind) -> Self {
        self.push(Expect::Write {
            line: line.to_string(),
            result: Err(io::Error::new(kind, "mock write error")),
        })
    }

    pub fn expect_read_line(self, line: &str) -> Self {
        self.push(Expect::ReadLine(Ok((line.as_bytes().to_vec(), false))))
    }

    pub fn expect_read_prefix(self, chunk: &str) -> Self {
        self.push(Expect::ReadLine(Ok((chunk.as_bytes().to_vec(), true))))
    }

    pub fn expect_read_bytes(self, bytes: &[u8]) -> Self {
        self.push(Expect::ReadLine(Ok((bytes.to_vec(), false))))
    }

    pub fn expect_read_eof(self) -> Self {
        self.expect_read_error(io::ErrorKind::UnexpectedEof)
    }

    pub fn expect_read_error(self, kind: io::ErrorKind) -> Self {
        self.push(Expect::ReadLine(Err(io::Error::new(kind, "mock read error"))))
    }

    /// Expect the `BYE` exchange and the release of the process
    pub fn expect_close(self) -> Self {
        self.expect_writeln("BYE")
            .expect_read_line("OK closing connection")
            .expect_release()
    }

    pub fn expect_release(self) -> Self {
        self.push(Expect::Close(Ok(())))
    }

    pub fn expect_release_failure(self) -> Self {
        self.push(Expect::Close(Err(io::Error::other("mock close error"))))
    }

    fn next(&mut self, call: &str) -> Expect {
        match self.script.pop_front() {
            Some(expect) => expect,
            None => panic!("unexpected call to {call}: script is exhausted"),
        }
    }
}

impl Process for MockProcess {
    fn start(&mut self, binary: &str, args: &[String]) -> io::Result<()> {
        match self.next("start") {
            Expect::Start {
                binary: want_binary,
                args: want_args,
                fail,
            } => {
                assert_eq!(binary, want_binary, "start binary");
                if fail {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "mock start error"));
                }
                assert_eq!(args, want_args.as_slice(), "start args");
                Ok(())
            }
            other => panic!("unexpected start({binary:?}, {args:?}), expected {other:?}"),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let got = String::from_utf8_lossy(buf).into_owned();
        match self.next("write") {
            Expect::Write { line, result } => {
                assert_eq!(got, format!("{line}\n"), "written line");
                result
            }
            other => panic!("unexpected write({got:?}), expected {other:?}"),
        }
    }

    fn read_line(&mut self) -> io::Result<(Vec<u8>, bool)> {
        match self.next("read_line") {
            Expect::ReadLine(result) => result,
            other => panic!("unexpected read_line(), expected {other:?}"),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.next("close") {
            Expect::Close(result) => result,
            other => panic!("unexpected close(), expected {other:?}"),
        }
    }
}

impl Drop for MockProcess {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(
                self.script.is_empty(),
                "unmet expectations: {:?}",
                self.script
            );
        }
    }
}
