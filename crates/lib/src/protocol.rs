//! Assuan wire protocol as spoken by pinentry programs
//!
//! One command is sent per exchange. The pinentry answers with zero or more
//! intermediate lines followed by a terminal `OK` or `ERR`.
//!
//! # Wire Format
//!
//! Messages are plain text lines terminated by `\n`. Arguments and data
//! payloads escape `%`, CR, LF and other control bytes as `%XX`.
//!
//! ## Command (single line)
//! ```text
//! SETDESC <text>
//! SETTIMEOUT <seconds>
//! SETQUALITYBAR
//! GETPIN
//! CONFIRM <text>
//! BYE
//! D <data>            (inquiry reply)
//! END                 (inquiry reply)
//! CAN                 (inquiry reply)
//! ```
//!
//! ## Response (one or more lines, terminated by `OK` or `ERR`)
//! ```text
//! OK [message]
//! ERR <code> [message]
//! D <data>
//! S <keyword> [args]
//! INQUIRE <keyword> [payload]
//! # comment
//! ```

use std::borrow::Cow;
use std::time::Duration;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Error code the pinentry reports when the user cancels the dialog
/// (`GPG_ERR_CANCELED` from source `GPG_ERR_SOURCE_PINENTRY`).
pub const CANCELLED: u32 = 83886179;

/// Status keyword announcing that the PIN came from an external cache
pub const PASSWORD_FROM_CACHE: &str = "PASSWORD_FROM_CACHE";

/// Inquiry keyword used by the quality bar
pub const QUALITY: &str = "QUALITY";

/// Bytes that must not appear raw inside an argument or data payload
const ESCAPE_SET: &AsciiSet = &CONTROLS.add(b'%');

/// Command sent to the pinentry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetCancel(String),
    SetDesc(String),
    SetError(String),
    SetKeyInfo(String),
    SetNotOk(String),
    SetOk(String),
    Option(String),
    SetPrompt(String),
    SetQualityBar,
    SetQualityBarTooltip(String),
    /// Whole seconds; sub-second precision is truncated
    SetTimeout(u64),
    SetTitle(String),
    GetPin,
    Confirm(String),
    Bye,

    /// Data line answering an inquiry
    Data(String),
    /// Concludes an inquiry answer
    End,
    /// Cancels the current inquiry
    Can,
}

impl Command {
    /// Build a `SETTIMEOUT` command, truncating to whole seconds
    pub fn set_timeout(timeout: Duration) -> Self {
        Command::SetTimeout(timeout.as_secs())
    }

    /// Protocol verb of this command
    pub fn verb(&self) -> &'static str {
        match self {
            Command::SetCancel(_) => "SETCANCEL",
            Command::SetDesc(_) => "SETDESC",
            Command::SetError(_) => "SETERROR",
            Command::SetKeyInfo(_) => "SETKEYINFO",
            Command::SetNotOk(_) => "SETNOTOK",
            Command::SetOk(_) => "SETOK",
            Command::Option(_) => "OPTION",
            Command::SetPrompt(_) => "SETPROMPT",
            Command::SetQualityBar => "SETQUALITYBAR",
            Command::SetQualityBarTooltip(_) => "SETQUALITYBAR_TT",
            Command::SetTimeout(_) => "SETTIMEOUT",
            Command::SetTitle(_) => "SETTITLE",
            Command::GetPin => "GETPIN",
            Command::Confirm(_) => "CONFIRM",
            Command::Bye => "BYE",
            Command::Data(_) => "D",
            Command::End => "END",
            Command::Can => "CAN",
        }
    }

    /// Whether the argument must stay out of logs
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Command::Data(_))
    }

    /// Encode the command as a single line, without the trailing newline
    pub fn encode(&self) -> String {
        let arg = match self {
            Command::SetCancel(text)
            | Command::SetDesc(text)
            | Command::SetError(text)
            | Command::SetKeyInfo(text)
            | Command::SetNotOk(text)
            | Command::SetOk(text)
            | Command::Option(text)
            | Command::SetPrompt(text)
            | Command::SetQualityBarTooltip(text)
            | Command::SetTitle(text)
            | Command::Confirm(text)
            | Command::Data(text) => Some(escape(text)),
            Command::SetTimeout(secs) => Some(Cow::Owned(secs.to_string())),
            Command::SetQualityBar
            | Command::GetPin
            | Command::Bye
            | Command::End
            | Command::Can => None,
        };

        match arg {
            Some(arg) => format!("{} {}", self.verb(), arg),
            None => self.verb().to_string(),
        }
    }
}

/// Response line received from the pinentry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command succeeded; the text after `OK` is informational
    Ok(String),

    /// Command failed
    Err { code: u32, message: String },

    /// Data payload, already unescaped
    Data(String),

    /// Status notice
    Status { keyword: String, args: String },

    /// The pinentry asks the client for data
    Inquire { keyword: String, payload: String },
}

impl Response {
    /// Decode a response from a line that is neither blank nor a comment.
    ///
    /// Lines matching no known shape are returned unchanged as the error.
    pub fn decode(line: &str) -> Result<Self, String> {
        if line == "OK" {
            return Ok(Response::Ok(String::new()));
        }
        if let Some(message) = line.strip_prefix("OK ") {
            return Ok(Response::Ok(message.to_string()));
        }
        if let Some(rest) = line.strip_prefix("ERR ") {
            let (code, message) = split_word(rest);
            let code = code.parse().map_err(|_| line.to_string())?;
            return Ok(Response::Err {
                code,
                message: message.to_string(),
            });
        }
        if let Some(data) = line.strip_prefix("D ") {
            return unescape(data)
                .map(Response::Data)
                .ok_or_else(|| line.to_string());
        }
        if let Some(rest) = line.strip_prefix("S ") {
            let (keyword, args) = split_word(rest);
            return Ok(Response::Status {
                keyword: keyword.to_string(),
                args: args.to_string(),
            });
        }
        if let Some(rest) = line.strip_prefix("INQUIRE ") {
            let (keyword, payload) = split_word(rest);
            let payload = unescape(payload).ok_or_else(|| line.to_string())?;
            return Ok(Response::Inquire {
                keyword: keyword.to_string(),
                payload,
            });
        }
        Err(line.to_string())
    }
}

/// Split off the first space-separated word
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start_matches(' ');
    match s.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (s, ""),
    }
}

/// Percent-escape an argument for the wire
pub fn escape(s: &str) -> Cow<'_, str> {
    utf8_percent_encode(s, ESCAPE_SET).into()
}

/// Undo percent-escaping. Returns `None` if the result is not UTF-8.
pub fn unescape(s: &str) -> Option<String> {
    percent_decode_str(s)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_setup_commands() {
        let cases = [
            (Command::SetCancel("cancel".into()), "SETCANCEL cancel"),
            (Command::SetDesc("desc".into()), "SETDESC desc"),
            (Command::SetError("error".into()), "SETERROR error"),
            (Command::SetKeyInfo("keyinfo".into()), "SETKEYINFO keyinfo"),
            (Command::SetNotOk("notok".into()), "SETNOTOK notok"),
            (Command::SetOk("ok".into()), "SETOK ok"),
            (Command::Option("option".into()), "OPTION option"),
            (Command::SetPrompt("prompt".into()), "SETPROMPT prompt"),
            (Command::SetQualityBar, "SETQUALITYBAR"),
            (
                Command::SetQualityBarTooltip("tooltip".into()),
                "SETQUALITYBAR_TT tooltip",
            ),
            (Command::SetTimeout(30), "SETTIMEOUT 30"),
            (Command::SetTitle("title".into()), "SETTITLE title"),
        ];

        for (command, line) in cases {
            assert_eq!(command.encode(), line);
        }
    }

    #[test]
    fn encode_bare_commands() {
        assert_eq!(Command::GetPin.encode(), "GETPIN");
        assert_eq!(Command::Bye.encode(), "BYE");
        assert_eq!(Command::End.encode(), "END");
        assert_eq!(Command::Can.encode(), "CAN");
        assert_eq!(Command::Data("42".into()).encode(), "D 42");
        assert_eq!(Command::Confirm("Sure?".into()).encode(), "CONFIRM Sure?");
    }

    #[test]
    fn timeout_is_truncated_to_seconds() {
        assert_eq!(
            Command::set_timeout(Duration::from_millis(2999)),
            Command::SetTimeout(2)
        );
        assert_eq!(
            Command::set_timeout(Duration::from_millis(500)).encode(),
            "SETTIMEOUT 0"
        );
    }

    #[test]
    fn encode_escapes_newlines_and_percent() {
        assert_eq!(
            Command::SetDesc("line1\nline2 100%".into()).encode(),
            "SETDESC line1%0Aline2 100%25"
        );
        assert_eq!(
            Command::SetTitle("a\r\nb".into()).encode(),
            "SETTITLE a%0D%0Ab"
        );
    }

    #[test]
    fn decode_ok() {
        assert_eq!(Response::decode("OK"), Ok(Response::Ok(String::new())));
        assert_eq!(
            Response::decode("OK Pleased to meet you"),
            Ok(Response::Ok("Pleased to meet you".into()))
        );
    }

    #[test]
    fn decode_ok_requires_separator() {
        assert_eq!(Response::decode("OKAY"), Err("OKAY".into()));
    }

    #[test]
    fn decode_err() {
        assert_eq!(
            Response::decode("ERR 83886179 Operation cancelled <Pinentry>"),
            Ok(Response::Err {
                code: CANCELLED,
                message: "Operation cancelled <Pinentry>".into(),
            })
        );
        assert_eq!(
            Response::decode("ERR 275"),
            Ok(Response::Err {
                code: 275,
                message: String::new(),
            })
        );
    }

    #[test]
    fn decode_err_with_bad_code() {
        assert_eq!(Response::decode("ERR abc oops"), Err("ERR abc oops".into()));
    }

    #[test]
    fn decode_data_unescapes() {
        assert_eq!(Response::decode("D abc"), Ok(Response::Data("abc".into())));
        assert_eq!(
            Response::decode("D 50%25 off%0A"),
            Ok(Response::Data("50% off\n".into()))
        );
    }

    #[test]
    fn decode_data_rejects_invalid_utf8() {
        assert_eq!(Response::decode("D %FF"), Err("D %FF".into()));
    }

    #[test]
    fn decode_status() {
        assert_eq!(
            Response::decode("S PASSWORD_FROM_CACHE"),
            Ok(Response::Status {
                keyword: PASSWORD_FROM_CACHE.into(),
                args: String::new(),
            })
        );
        assert_eq!(
            Response::decode("S PROGRESS a b"),
            Ok(Response::Status {
                keyword: "PROGRESS".into(),
                args: "a b".into(),
            })
        );
    }

    #[test]
    fn decode_inquire() {
        assert_eq!(
            Response::decode("INQUIRE QUALITY ab%25c"),
            Ok(Response::Inquire {
                keyword: QUALITY.into(),
                payload: "ab%c".into(),
            })
        );
        assert_eq!(
            Response::decode("INQUIRE QUALITY"),
            Ok(Response::Inquire {
                keyword: QUALITY.into(),
                payload: String::new(),
            })
        );
    }

    #[test]
    fn decode_unknown_line() {
        assert_eq!(
            Response::decode("unexpected response"),
            Err("unexpected response".into())
        );
        assert_eq!(Response::decode("D"), Err("D".into()));
    }
}
