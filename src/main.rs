use clap::Parser;
use inbox_export::app;
use inbox_export::cli::{handle_keyring_clear, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("inbox_export={}", level))),
        )
        .init();

    if cli.clear_keyring {
        handle_keyring_clear()?;
        return Ok(());
    }

    if let Err(e) = app::run(&cli).await {
        tracing::error!("An error occurred: {}", e);
        return Err(e);
    }
    Ok(())
}
