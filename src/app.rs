use crate::cli::{Cli, Command};
use crate::config::ExportConfig;
use crate::exporter::BatchExporter;
use crate::gmail_api::{
    list_message_ids, CredentialProvider, GmailClient, KeyringCredentialProvider, MessageSource,
};
use crate::output::combine_csv_files;
use crate::prompt::TerminalPrompt;
use crate::types::LabelMap;
use std::path::PathBuf;

// Dispatch the parsed command line
pub async fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Some(Command::Combine { inputs, output }) => {
            let rows = combine_csv_files(inputs, output)?;
            println!("Combined {} rows into {}", rows, output.display());
        }
        None => {
            let config = cli.export_config();
            let provider = KeyringCredentialProvider::new(&config.client_secret_path)?;
            let credentials = provider.get_credentials().await?;
            let client = GmailClient::new(reqwest::Client::new(), credentials);

            let saved_file =
                export_mailbox(&client, &config, cli.session_id.as_deref(), cli.fresh).await?;
            println!("Messages saved to: {}", saved_file.display());
        }
    }
    Ok(())
}

/// List, label, and export every message matching the configured labels.
pub async fn export_mailbox<S: MessageSource + ?Sized>(
    source: &S,
    config: &ExportConfig,
    session_id: Option<&str>,
    fresh: bool,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let messages =
        list_message_ids(source, &config.label_ids, config.max_results_per_page).await?;

    let labels = source.list_labels().await?;
    let label_mappings = LabelMap::from_labels(&labels);
    if label_mappings.is_empty() {
        tracing::warn!("No label names available; label ids will be exported as-is");
    } else {
        tracing::info!("Total labels found: {}", label_mappings.len());
    }

    let exporter = BatchExporter::new(source, TerminalPrompt, config)?;
    let saved_file = exporter
        .save_messages(&messages, &label_mappings, session_id, fresh)
        .await?;
    tracing::info!("Messages saved to: {}", saved_file.display());
    Ok(saved_file)
}
