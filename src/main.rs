use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hookboard::store::{self, DEFAULT_DATABASE_URL};
use hookboard::webhook;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "5000")]
    port: u16,

    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Storage connection string: `sqlite://<path>`, `sqlite::memory:` or `memory://`.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let store = store::open(&args.database_url)?;
    info!("Using event store at {}", args.database_url);

    let addr = format!("{}:{}", args.bind, args.port);
    webhook::serve(&addr, store).await?;
    Ok(())
}
