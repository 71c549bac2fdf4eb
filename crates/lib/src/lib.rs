//! Client for the Assuan protocol spoken by pinentry programs.
//!
//! ```no_run
//! use libpinwire::{Client, ClientOptions};
//!
//! let mut client = Client::new(
//!     ClientOptions::new()
//!         .with_title("Unlock key")
//!         .with_prompt("Passphrase:")
//!         .with_quality_bar(|pin| ((pin.len() * 10).min(100) as i32, true)),
//! )?;
//! let pin = client.get_pin();
//! client.close()?;
//! println!("from cache: {}", pin?.from_cache);
//! # Ok::<(), libpinwire::Error>(())
//! ```

pub mod agent_conf;
pub mod client;
pub mod codec;
pub mod options;
pub mod paths;
pub mod process;
pub mod protocol;

#[cfg(test)]
mod mock;

pub use client::{Client, Error, Pin};
pub use options::{ClientOptions, QualityBar};
pub use process::{ChildProcess, Process};
