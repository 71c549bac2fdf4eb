use std::env;
use std::fmt;
use std::time::Duration;

use crate::agent_conf;
use crate::paths;
use crate::protocol::Command;

/// Default pinentry binary, looked up in `PATH`
pub const DEFAULT_BINARY: &str = "pinentry";

/// Quality-bar callback: receives the partial PIN, returns the score and
/// whether to send it. Returning `false` cancels just that inquiry.
pub type QualityBar = Box<dyn FnMut(&str) -> (i32, bool) + Send>;

/// Launch and setup configuration for a [`Client`](crate::Client)
pub struct ClientOptions {
    pub(crate) binary_name: String,
    args: Vec<String>,
    debug: bool,
    no_global_grab: bool,
    cancel: Option<String>,
    desc: Option<String>,
    error: Option<String>,
    key_info: Option<String>,
    not_ok: Option<String>,
    ok: Option<String>,
    options: Vec<String>,
    prompt: Option<String>,
    pub(crate) quality_bar: Option<QualityBar>,
    quality_bar_tooltip: Option<String>,
    timeout: Option<Duration>,
    title: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            binary_name: DEFAULT_BINARY.to_string(),
            args: Vec::new(),
            debug: false,
            no_global_grab: false,
            cancel: None,
            desc: None,
            error: None,
            key_info: None,
            not_ok: None,
            ok: None,
            options: Vec::new(),
            prompt: None,
            quality_bar: None,
            quality_bar_tooltip: None,
            timeout: None,
            title: None,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("binary_name", &self.binary_name)
            .field("args", &self.launch_args())
            .field("setup", &self.setup_commands())
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name or path of the pinentry binary
    pub fn with_binary_name(mut self, name: impl Into<String>) -> Self {
        self.binary_name = name.into();
        self
    }

    /// Use the `pinentry-program` configured in gpg-agent.conf, if any
    pub fn with_binary_name_from_gnupg_agent_conf(mut self) -> Self {
        if let Some(program) = paths::gpg_agent_conf_path()
            .and_then(|path| agent_conf::read_pinentry_program(&path))
        {
            self.binary_name = program;
        }
        self
    }

    /// Extra launch arguments, appended after the flag-derived ones
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn with_no_global_grab(mut self) -> Self {
        self.no_global_grab = true;
        self
    }

    pub fn with_cancel(mut self, text: impl Into<String>) -> Self {
        self.cancel = Some(text.into());
        self
    }

    pub fn with_desc(mut self, text: impl Into<String>) -> Self {
        self.desc = Some(text.into());
        self
    }

    pub fn with_error(mut self, text: impl Into<String>) -> Self {
        self.error = Some(text.into());
        self
    }

    pub fn with_key_info(mut self, text: impl Into<String>) -> Self {
        self.key_info = Some(text.into());
        self
    }

    pub fn with_not_ok(mut self, text: impl Into<String>) -> Self {
        self.not_ok = Some(text.into());
        self
    }

    pub fn with_ok(mut self, text: impl Into<String>) -> Self {
        self.ok = Some(text.into());
        self
    }

    /// Add one `OPTION` command
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Add one `OPTION` command per entry
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    /// Forward `$GPG_TTY` as the `ttyname` option, if set
    pub fn with_gpg_tty(self) -> Self {
        match env::var("GPG_TTY") {
            Ok(tty) if !tty.is_empty() => self.with_tty_name(tty),
            _ => self,
        }
    }

    pub fn with_tty_name(self, tty: impl AsRef<str>) -> Self {
        self.with_option(format!("ttyname={}", tty.as_ref()))
    }

    pub fn with_prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = Some(text.into());
        self
    }

    /// Enable the quality bar, scored by `callback`
    pub fn with_quality_bar<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str) -> (i32, bool) + Send + 'static,
    {
        self.quality_bar = Some(Box::new(callback));
        self
    }

    pub fn with_quality_bar_tooltip(mut self, text: impl Into<String>) -> Self {
        self.quality_bar_tooltip = Some(text.into());
        self
    }

    /// Dialog timeout; sent as whole seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_title(mut self, text: impl Into<String>) -> Self {
        self.title = Some(text.into());
        self
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Arguments passed to the pinentry binary
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.debug {
            args.push("--debug".to_string());
        }
        if self.no_global_grab {
            args.push("--no-global-grab".to_string());
        }
        args.extend(self.args.iter().cloned());
        args
    }

    /// Commands sent right after the greeting, in protocol order
    pub fn setup_commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();

        let texts: [(&Option<String>, fn(String) -> Command); 6] = [
            (&self.cancel, Command::SetCancel),
            (&self.desc, Command::SetDesc),
            (&self.error, Command::SetError),
            (&self.key_info, Command::SetKeyInfo),
            (&self.not_ok, Command::SetNotOk),
            (&self.ok, Command::SetOk),
        ];
        for (text, command) in texts {
            if let Some(text) = text {
                commands.push(command(text.clone()));
            }
        }

        commands.extend(self.options.iter().cloned().map(Command::Option));

        if let Some(prompt) = &self.prompt {
            commands.push(Command::SetPrompt(prompt.clone()));
        }
        if self.quality_bar.is_some() {
            commands.push(Command::SetQualityBar);
        }
        if let Some(tooltip) = &self.quality_bar_tooltip {
            commands.push(Command::SetQualityBarTooltip(tooltip.clone()));
        }
        if let Some(timeout) = self.timeout {
            commands.push(Command::set_timeout(timeout));
        }
        if let Some(title) = &self.title {
            commands.push(Command::SetTitle(title.clone()));
        }

        commands
    }
}
