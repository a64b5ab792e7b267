//! certchat command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Generate the authority signing key and escrow keypair
//! certchat keygen --out certchat-keys.json
//!
//! # Run an in-process Alice/Bob exchange, logging every transport payload
//! certchat demo --message "hello"
//!
//! # Same, with keys from a bootstrap file and session key escrow
//! certchat demo --keys certchat-keys.json --escrow
//! ```

mod demo;
mod error;
mod keyfile;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::keyfile::KeyFile;

/// Certificate-authenticated messaging tool
#[derive(Parser, Debug)]
#[command(name = "certchat")]
#[command(about = "certchat key bootstrap and demo")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the authority signing key and an escrow keypair
    Keygen {
        /// Where to write the key file
        #[arg(short, long, default_value_os_t = keyfile::default_path())]
        out: PathBuf,

        /// Replace an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Run an Alice/Bob exchange in-process
    Demo {
        /// Key file from `keygen`; keys are generated for the run if omitted
        #[arg(short, long)]
        keys: Option<PathBuf>,

        /// Escrow the session key and read the first message as the escrow
        /// holder
        #[arg(long)]
        escrow: bool,

        /// First message Alice sends
        #[arg(short, long, default_value = "hello")]
        message: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match args.command {
        Command::Keygen { out, force } => {
            let keys = KeyFile::generate(&mut OsRng);
            keys.write(&out, force)?;

            tracing::info!(path = %out.display(), "wrote authority and escrow keys");
            tracing::info!(public_key = %keys.authority.public_key, "authority public key");
            tracing::info!(escrow = %keys.escrow.x, "escrow public key");
        },
        Command::Demo { keys, escrow, message } => {
            let keys = keys.as_deref().map(KeyFile::read).transpose()?;
            let transcript = demo::run(keys.as_ref(), escrow, &message, &mut OsRng)?;

            tracing::info!(
                bob_received = %String::from_utf8_lossy(&transcript.bob_received),
                alice_received = %String::from_utf8_lossy(&transcript.alice_received),
                replay_rejected = transcript.replay_error.is_some(),
                escrow = transcript.escrow_recovered.is_some(),
                "demo complete"
            );
        },
    }

    Ok(())
}
