use std::fmt;
use std::io;

use tracing::{debug, trace, warn};

use crate::codec::{LineTransport, TransportError};
use crate::options::{ClientOptions, QualityBar};
use crate::process::{ChildProcess, Process};
use crate::protocol::{self, Command, Response};

/// Errors from the pinentry client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to start {binary}: {source}")]
    Launch {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("pinentry greeting failed: {0}")]
    Greeting(#[source] Box<Error>),
    #[error("{verb} rejected: {source}")]
    Setup {
        verb: &'static str,
        #[source]
        source: Box<Error>,
    },
    #[error("operation cancelled: {message}")]
    Cancelled { message: String },
    #[error("pinentry error {code}: {message}")]
    Assuan { code: u32, message: String },
    #[error("unexpected response: {line:?}")]
    UnexpectedResponse { line: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to release pinentry: {0}")]
    Release(#[source] io::Error),
    #[error("close failed: {exchange}; releasing pinentry also failed: {release}")]
    Close {
        #[source]
        exchange: Box<Error>,
        release: io::Error,
    },
}

impl Error {
    /// Classify an `ERR` response
    fn from_err(code: u32, message: String) -> Self {
        if code == protocol::CANCELLED {
            Error::Cancelled { message }
        } else {
            Error::Assuan { code, message }
        }
    }

    /// Whether the user cancelled the dialog
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::Greeting(inner) | Error::Setup { source: inner, .. } => inner.is_cancelled(),
            Error::Close { exchange, .. } => exchange.is_cancelled(),
            _ => false,
        }
    }

    /// Whether this error came from an `ERR` line
    fn is_err_response(&self) -> bool {
        matches!(self, Error::Cancelled { .. } | Error::Assuan { .. })
    }
}

/// PIN returned by [`Client::get_pin`]
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Pin {
    pub value: String,
    /// The pinentry answered from its own cache without asking the user
    pub from_cache: bool,
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pin")
            .field("value", &"[redacted]")
            .field("from_cache", &self.from_cache)
            .finish()
    }
}

/// Data and status gathered while waiting for `OK`
#[derive(Default)]
struct Reply {
    data: String,
    from_cache: bool,
}

/// Session with a running pinentry.
///
/// Exactly one command is in flight at a time; every method blocks until the
/// pinentry has answered.
pub struct Client<P: Process = ChildProcess> {
    transport: LineTransport<P>,
    quality_bar: Option<QualityBar>,
}

impl<P: Process + fmt::Debug> fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport)
            .field("quality_bar", &self.quality_bar.is_some())
            .finish()
    }
}

impl Client<ChildProcess> {
    /// Launch the configured pinentry binary and set it up
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        Self::with_process(options, ChildProcess::new())
    }
}

impl<P: Process> Client<P> {
    /// Start `process` and set it up.
    ///
    /// Fails if the process does not start, the greeting is not `OK`, or any
    /// setup command is answered with `ERR`.
    pub fn with_process(mut options: ClientOptions, mut process: P) -> Result<Self, Error> {
        let binary = options.binary_name.clone();
        let args = options.launch_args();
        debug!(binary = %binary, ?args, "Starting pinentry");
        process
            .start(&binary, &args)
            .map_err(|source| Error::Launch {
                binary: binary.clone(),
                source,
            })?;

        let setup = options.setup_commands();
        let mut client = Self {
            transport: LineTransport::new(process),
            quality_bar: options.quality_bar.take(),
        };

        client
            .read_ok()
            .map_err(|e| Error::Greeting(Box::new(e)))?;

        for command in setup {
            client.send(&command)?;
            client.read_ok().map_err(|e| {
                if e.is_err_response() {
                    Error::Setup {
                        verb: command.verb(),
                        source: Box::new(e),
                    }
                } else {
                    e
                }
            })?;
        }

        Ok(client)
    }

    /// Ask the user for a PIN
    pub fn get_pin(&mut self) -> Result<Pin, Error> {
        let reply = self.exchange(&Command::GetPin)?;
        Ok(Pin {
            value: reply.data,
            from_cache: reply.from_cache,
        })
    }

    /// Ask the user to confirm `text`.
    ///
    /// Cancelling the dialog is the user declining, so it yields `Ok(false)`.
    pub fn confirm(&mut self, text: &str) -> Result<bool, Error> {
        match self.exchange(&Command::Confirm(text.to_string())) {
            Ok(_) => Ok(true),
            Err(Error::Cancelled { message }) => {
                debug!(message = %message, "Confirmation declined");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Say `BYE` and release the process.
    ///
    /// The process is released even if the `BYE` exchange fails.
    pub fn close(mut self) -> Result<(), Error> {
        let exchange = self.exchange(&Command::Bye).map(|_| ());
        let release = self.transport.process_mut().close();

        match (exchange, release) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(e)) => Err(Error::Release(e)),
            (Err(exchange), Err(release)) => Err(Error::Close {
                exchange: Box::new(exchange),
                release,
            }),
        }
    }

    /// Give back the underlying process without saying `BYE`
    pub fn into_process(self) -> P {
        self.transport.into_inner()
    }

    fn send(&mut self, command: &Command) -> Result<(), Error> {
        let line = command.encode();
        if command.is_sensitive() {
            trace!(verb = command.verb(), "Sending [redacted]");
        } else {
            debug!(line = %line, "Sending command");
        }
        self.transport.write_line(&line)?;
        Ok(())
    }

    fn exchange(&mut self, command: &Command) -> Result<Reply, Error> {
        self.send(command)?;
        self.read_reply()
    }

    /// Read a single line and require it to be `OK`
    fn read_ok(&mut self) -> Result<(), Error> {
        let line = self.transport.read_line()?;
        match Response::decode(&line) {
            Ok(Response::Ok(message)) => {
                trace!(message = %message, "Received OK");
                Ok(())
            }
            Ok(Response::Err { code, message }) => {
                debug!(code, message = %message, "Received ERR");
                Err(Error::from_err(code, message))
            }
            Ok(_) | Err(_) => Err(Error::UnexpectedResponse { line }),
        }
    }

    /// Read lines until `OK` or `ERR`, answering inquiries on the way
    fn read_reply(&mut self) -> Result<Reply, Error> {
        let mut reply = Reply::default();

        loop {
            let line = self.transport.read_line()?;
            let response = match Response::decode(&line) {
                Ok(response) => response,
                Err(line) => {
                    // An inquiry we cannot decode still blocks the pinentry
                    if line.starts_with("INQUIRE ") {
                        self.send(&Command::Can)?;
                    }
                    return Err(Error::UnexpectedResponse { line });
                }
            };

            match response {
                Response::Data(data) => {
                    trace!("Received D [redacted]");
                    reply.data.push_str(&data);
                }
                Response::Status { keyword, args } => {
                    trace!(keyword = %keyword, args = %args, "Received status");
                    if keyword == protocol::PASSWORD_FROM_CACHE {
                        reply.from_cache = true;
                    } else {
                        warn!(keyword = %keyword, "Ignoring unknown status");
                    }
                }
                Response::Inquire { keyword, payload } => {
                    trace!(keyword = %keyword, "Received inquiry");
                    self.inquire(&keyword, &payload, line)?;
                }
                Response::Ok(message) => {
                    trace!(message = %message, "Received OK");
                    return Ok(reply);
                }
                Response::Err { code, message } => {
                    debug!(code, message = %message, "Received ERR");
                    return Err(Error::from_err(code, message));
                }
            }
        }
    }

    /// Answer an `INQUIRE`. Only `QUALITY` is handled, and only with a
    /// quality bar configured; anything else is cancelled and reported.
    fn inquire(&mut self, keyword: &str, payload: &str, line: String) -> Result<(), Error> {
        let verdict = match (keyword, self.quality_bar.as_mut()) {
            (protocol::QUALITY, Some(quality_bar)) => Some(quality_bar(payload)),
            _ => None,
        };

        match verdict {
            Some((score, true)) => {
                self.send(&Command::Data(score.to_string()))?;
                self.send(&Command::End)
            }
            Some((_, false)) => self.send(&Command::Can),
            None => {
                self.send(&Command::Can)?;
                Err(Error::UnexpectedResponse { line })
            }
        }
    }
}
