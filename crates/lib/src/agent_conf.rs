//! Lookup of the pinentry program configured for gpg-agent

use std::fs;
use std::path::Path;

use tracing::debug;

const PINENTRY_PROGRAM: &str = "pinentry-program";

/// Find the first `pinentry-program <path>` entry in gpg-agent.conf contents
pub fn pinentry_program(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix(PINENTRY_PROGRAM)?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        rest.split_whitespace().next().map(String::from)
    })
}

/// Read the configured pinentry program from a file. Returns `None` on any error.
pub fn read_pinentry_program(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let program = pinentry_program(&contents);
    debug!(?path, ?program, "Read gpg-agent configuration");
    program
}
