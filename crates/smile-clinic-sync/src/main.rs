use clap::Parser;
use smile_clinic_sync::cli::Cli;
use smile_clinic_sync::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), db = %cli.db.display(), "clinic-sync");

    cli.run().await
}
