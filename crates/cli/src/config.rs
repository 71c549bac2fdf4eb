use std::path::PathBuf;
use std::time::Duration;

use libpinwire::ClientOptions;
use serde::Deserialize;
use tracing::warn;

/// Main configuration (~/.config/pinwire/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// pinentry binary name or path
    pub binary: Option<String>,

    /// Take the binary from gpg-agent.conf's `pinentry-program`
    pub use_gpg_agent_conf: bool,

    /// Extra arguments for the pinentry binary
    pub args: Vec<String>,

    pub debug: bool,
    pub no_global_grab: bool,

    /// Forward $GPG_TTY as the ttyname option
    pub gpg_tty: bool,

    pub title: Option<String>,

    /// Dialog timeout in seconds
    pub timeout: Option<u64>,

    /// Raw `OPTION` values, e.g. "allow-external-password-cache"
    pub options: Vec<String>,

    /// Show the quality bar when asking for a PIN
    pub quality_bar: bool,
    pub quality_bar_tooltip: Option<String>,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match Self::parse(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(?path, "Ignoring invalid config: {e}");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pinwire/config.toml"))
    }

    /// Launch and setup options described by this config.
    ///
    /// The quality-bar keys only apply to `get-pin` and are left to the caller.
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new();

        if self.use_gpg_agent_conf {
            options = options.with_binary_name_from_gnupg_agent_conf();
        }
        // An explicit binary wins over gpg-agent.conf
        if let Some(binary) = &self.binary {
            options = options.with_binary_name(binary.as_str());
        }
        if self.debug {
            options = options.with_debug();
        }
        if self.no_global_grab {
            options = options.with_no_global_grab();
        }
        options = options
            .with_args(self.args.iter().cloned())
            .with_options(self.options.iter().cloned());
        if self.gpg_tty {
            options = options.with_gpg_tty();
        }
        if let Some(title) = &self.title {
            options = options.with_title(title.as_str());
        }
        if let Some(secs) = self.timeout {
            options = options.with_timeout(Duration::from_secs(secs));
        }

        options
    }
}
