mod config;
mod strength;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use libpinwire::{Client, ClientOptions, Error};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use config::Config;

/// Pinwire - ask for a PIN or a confirmation through pinentry
#[derive(Parser)]
#[command(name = "pinwire", version, about)]
struct Cli {
    #[command(flatten)]
    launch: LaunchArgs,

    #[command(flatten)]
    dialog: DialogArgs,

    #[command(subcommand)]
    command: Command,
}

/// How the pinentry binary is started
#[derive(Args)]
struct LaunchArgs {
    /// pinentry binary name or path
    #[arg(long, global = true)]
    binary: Option<String>,

    /// Extra argument passed to the pinentry binary (repeatable)
    #[arg(long = "arg", global = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Run pinentry with --debug
    #[arg(long, global = true)]
    debug: bool,

    /// Run pinentry with --no-global-grab
    #[arg(long, global = true)]
    no_global_grab: bool,

    /// Forward $GPG_TTY to pinentry
    #[arg(long, global = true)]
    gpg_tty: bool,
}

/// Dialog texts and behavior
#[derive(Args)]
struct DialogArgs {
    #[arg(long, global = true)]
    title: Option<String>,

    /// Descriptive text shown above the entry
    #[arg(long, global = true)]
    desc: Option<String>,

    #[arg(long, global = true)]
    prompt: Option<String>,

    /// Error text shown in the dialog
    #[arg(long, global = true)]
    error: Option<String>,

    /// Label of the OK button
    #[arg(long, global = true)]
    ok: Option<String>,

    /// Label of the Cancel button
    #[arg(long, global = true)]
    cancel: Option<String>,

    /// Label of the "not OK" button
    #[arg(long, global = true)]
    not_ok: Option<String>,

    /// Cache key info (e.g. "n/<keygrip>")
    #[arg(long, global = true)]
    key_info: Option<String>,

    /// Raw pinentry OPTION (repeatable)
    #[arg(long = "option", global = true)]
    options: Vec<String>,

    /// Timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask for a PIN and print it to stdout
    GetPin {
        /// Show a quality bar driven by a built-in strength estimate
        #[arg(long)]
        quality_bar: bool,

        /// Tooltip for the quality bar
        #[arg(long)]
        quality_bar_tooltip: Option<String>,
    },

    /// Ask for a yes/no confirmation; exits 1 when declined
    Confirm {
        /// Text to confirm
        text: String,
    },
}

const EXIT_DECLINED: u8 = 1;
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::load();
    debug!(?config, "Config loaded");

    let options = build_options(&config, &cli);
    debug!(?options, "Client options");

    match cli.command {
        Command::GetPin { .. } => run_get_pin(options),
        Command::Confirm { text } => run_confirm(options, &text),
    }
}

/// Merge config file and command line; the command line wins
fn build_options(config: &Config, cli: &Cli) -> ClientOptions {
    let mut options = config.client_options();
    let launch = &cli.launch;
    let dialog = &cli.dialog;

    if let Some(binary) = &launch.binary {
        options = options.with_binary_name(binary.as_str());
    }
    if launch.debug && !config.debug {
        options = options.with_debug();
    }
    if launch.no_global_grab && !config.no_global_grab {
        options = options.with_no_global_grab();
    }
    options = options.with_args(launch.args.iter().cloned());
    if launch.gpg_tty && !config.gpg_tty {
        options = options.with_gpg_tty();
    }

    let texts: [(&Option<String>, fn(ClientOptions, String) -> ClientOptions); 8] = [
        (&dialog.title, |o: ClientOptions, t: String| o.with_title(t)),
        (&dialog.desc, |o: ClientOptions, t: String| o.with_desc(t)),
        (&dialog.prompt, |o: ClientOptions, t: String| o.with_prompt(t)),
        (&dialog.error, |o: ClientOptions, t: String| o.with_error(t)),
        (&dialog.ok, |o: ClientOptions, t: String| o.with_ok(t)),
        (&dialog.cancel, |o: ClientOptions, t: String| o.with_cancel(t)),
        (&dialog.not_ok, |o: ClientOptions, t: String| o.with_not_ok(t)),
        (&dialog.key_info, |o: ClientOptions, t: String| o.with_key_info(t)),
    ];
    for (text, with) in texts {
        if let Some(text) = text {
            options = with(options, text.clone());
        }
    }

    options = options.with_options(dialog.options.iter().cloned());
    if let Some(secs) = dialog.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    if let Command::GetPin {
        quality_bar,
        quality_bar_tooltip,
    } = &cli.command
    {
        if let Some(tooltip) = quality_bar_tooltip
            .as_ref()
            .or(config.quality_bar_tooltip.as_ref())
        {
            options = options.with_quality_bar_tooltip(tooltip.as_str());
        }
        if *quality_bar || config.quality_bar {
            options = options.with_quality_bar(|pin| (strength::score(pin), true));
        }
    }

    options
}

fn run_get_pin(options: ClientOptions) -> ExitCode {
    let mut client = match Client::new(options) {
        Ok(c) => c,
        Err(e) => return report(&e),
    };

    let result = client.get_pin();
    let closed = client.close();

    match result {
        Ok(pin) => {
            info!(from_cache = pin.from_cache, "PIN received");
            if let Err(e) = closed {
                return report(&e);
            }
            println!("{}", pin.value);
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

fn run_confirm(options: ClientOptions, text: &str) -> ExitCode {
    let mut client = match Client::new(options) {
        Ok(c) => c,
        Err(e) => return report(&e),
    };

    let result = client.confirm(text);
    let closed = client.close();

    match (result, closed) {
        (Ok(true), Ok(())) => ExitCode::SUCCESS,
        (Ok(false), Ok(())) => {
            info!("Declined");
            ExitCode::from(EXIT_DECLINED)
        }
        (Err(e), _) | (Ok(_), Err(e)) => report(&e),
    }
}

fn report(e: &Error) -> ExitCode {
    if e.is_cancelled() {
        eprintln!("Cancelled");
        ExitCode::from(EXIT_DECLINED)
    } else {
        eprintln!("Error: {e}");
        ExitCode::from(EXIT_FAILURE)
    }
}
