//! tally-server: encrypted tally service with HTTP API
//!
//! Generates a fresh key set at startup, serves the public key to clients
//! and sums the ciphertexts they submit.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use eyre::{eyre, Context, Result};
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ckks_tally::api::{router, TallyService, DEFAULT_MAX_BODY_BYTES};
use ckks_tally::{CryptoContext, KeyGenerator, SchemeParameters};

#[derive(Parser)]
#[command(name = "tally-server")]
#[command(about = "Homomorphic tally server")]
#[command(version)]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Parameter preset: default, compact or wide
    #[arg(long, default_value = "default")]
    preset: String,

    /// JSON file with scheme parameters (overrides --preset)
    #[arg(long)]
    params: Option<PathBuf>,

    /// Deterministic key generation seed (testing only)
    #[arg(long)]
    seed: Option<u64>,

    /// Request body limit in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Write the base64 public-key bundle to this file
    #[arg(long)]
    dump_public_key: Option<PathBuf>,

    /// Log at DEBUG level
    #[arg(long, short)]
    verbose: bool,
}

fn load_params(args: &Args) -> Result<SchemeParameters> {
    match &args.params {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open parameter file: {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse parameter file: {}", path.display()))
        }
        None => SchemeParameters::preset(&args.preset)
            .ok_or_else(|| eyre!("Unknown preset '{}' (expected default, compact or wide)", args.preset)),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Homomorphic tally server");
    info!("Bind address: {}", args.bind);

    let params = load_params(&args)?;
    let start = Instant::now();
    let ctx = CryptoContext::new(params).wrap_err("Invalid scheme parameters")?;

    let mut keygen = match args.seed {
        Some(seed) => {
            info!("Using deterministic key seed {}", seed);
            KeyGenerator::with_seed(Arc::clone(&ctx), seed)
        }
        None => KeyGenerator::new(Arc::clone(&ctx)),
    };
    let keys = keygen.generate();
    let service = TallyService::new(Arc::clone(&ctx), keys)
        .wrap_err("Failed to set up the tally service")?;
    info!("Context and keys ready in {:.2?}", start.elapsed());

    if let Some(path) = &args.dump_public_key {
        std::fs::write(path, service.public_key_base64())
            .with_context(|| format!("Failed to write public key: {}", path.display()))?;
        info!("Public key bundle written to {}", path.display());
    }

    let app = router(Arc::new(service), args.max_body_bytes);

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Listening on {}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
