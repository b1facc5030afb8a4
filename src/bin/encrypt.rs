//! tally-encrypt: offline client for the tally server
//!
//! Reads the base64 public-key bundle served at `/api/key`, encrypts one
//! number and prints the base64 ciphertext ready for `/api/submit`.

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use ckks_tally::wire;
use ckks_tally::{Encryptor, PublicKeyBundle};

#[derive(Parser)]
#[command(name = "tally-encrypt")]
#[command(about = "Encrypt a number for a tally server")]
#[command(version)]
struct Args {
    /// Value to encrypt
    #[arg(allow_negative_numbers = true)]
    value: f64,

    /// File holding the base64 public-key bundle (stdin when omitted)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Log at DEBUG level (to stderr)
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let text = match &args.key {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read public key: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .wrap_err("Failed to read public key from stdin")?;
            buf
        }
    };

    let bundle: PublicKeyBundle =
        wire::from_base64(&text).wrap_err("Failed to decode public key bundle")?;
    debug!(parms_id = %bundle.parms_id, "public key bundle decoded");

    let encryptor = Encryptor::from_bundle(bundle).wrap_err("Public key bundle rejected")?;
    let ct = encryptor
        .encrypt_number(args.value)
        .with_context(|| format!("Failed to encrypt {}", args.value))?;

    println!("{}", wire::to_base64(&ct)?);
    Ok(())
}
