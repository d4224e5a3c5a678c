use crate::config::{self, ExportConfig};
use crate::gmail_api::auth::{clear_keyring, AuthError};
use crate::gmail_api::{KEYRING_SERVICE_NAME, KEYRING_USERNAME};
use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand};
use keyring::Entry;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Export Gmail messages to CSV with resume support", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Option<Command>,

    /// Custom session ID for processing (defaults to the start time).
    #[clap(long)]
    pub session_id: Option<String>,

    /// Force a fresh start even if a checkpoint exists.
    #[clap(long)]
    pub fresh: bool,

    /// Label to export; repeat for several labels.
    #[clap(long = "label", default_value = config::DEFAULT_LABEL)]
    pub labels: Vec<String>,

    /// Base data directory; exports go to <DATA_DIR>/emails.
    #[clap(long, default_value = config::DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Messages buffered between writes to the output file.
    #[clap(long, default_value_t = config::DUMP_FREQUENCY, value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize))]
    pub dump_frequency: usize,

    /// Page size used when listing messages.
    #[clap(long, default_value_t = config::MAX_RESULTS_PER_PAGE, value_parser = clap::value_parser!(u64).range(1..=500).map(|v| v as usize))]
    pub max_results: usize,

    /// OAuth client secret downloaded from the Google Cloud console.
    #[clap(long, default_value = config::CLIENT_SECRET_FILE)]
    pub client_secret: PathBuf,

    /// Clear the stored credentials from the system keyring and exit.
    #[clap(long)]
    pub clear_keyring: bool,

    /// Log at debug level.
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Combine finished CSV exports into a single file.
    Combine {
        /// CSV files to combine, in order.
        #[clap(required = true)]
        inputs: Vec<PathBuf>,

        /// Where to write the combined CSV.
        #[clap(short, long)]
        output: PathBuf,
    },
}

impl Cli {
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            data_dir: self.data_dir.clone(),
            dump_frequency: self.dump_frequency,
            max_results_per_page: self.max_results,
            label_ids: self.labels.clone(),
            client_secret_path: self.client_secret.clone(),
        }
    }
}

pub fn handle_keyring_clear() -> Result<(), AuthError> {
    let credentials_keyring = Entry::new(KEYRING_SERVICE_NAME, KEYRING_USERNAME)?;
    clear_keyring(&credentials_keyring)?;
    println!("Credentials removed from keyring. Exiting.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let cli = Cli::parse_from(["inbox-export"]);
        let config = cli.export_config();
        assert!(cli.command.is_none());
        assert!(!cli.fresh);
        assert_eq!(config.dump_frequency, config::DUMP_FREQUENCY);
        assert_eq!(config.max_results_per_page, config::MAX_RESULTS_PER_PAGE);
        assert_eq!(config.label_ids, vec!["INBOX"]);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_session_flags() {
        let cli = Cli::parse_from([
            "inbox-export",
            "--session-id",
            "backup-2024",
            "--fresh",
            "--label",
            "SENT",
            "--label",
            "Label_3",
            "--dump-frequency",
            "25",
        ]);
        assert_eq!(cli.session_id.as_deref(), Some("backup-2024"));
        assert!(cli.fresh);
        assert_eq!(cli.labels, vec!["SENT", "Label_3"]);
        assert_eq!(cli.dump_frequency, 25);
    }

    #[test]
    fn test_zero_dump_frequency_is_rejected() {
        assert!(Cli::try_parse_from(["inbox-export", "--dump-frequency", "0"]).is_err());
        assert!(Cli::try_parse_from(["inbox-export", "--max-results", "501"]).is_err());
    }

    #[test]
    fn test_combine_subcommand() {
        let cli = Cli::parse_from(["inbox-export", "combine", "a.csv", "b.csv", "-o", "all.csv"]);
        match cli.command {
            Some(Command::Combine { inputs, output }) => {
                assert_eq!(inputs, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
                assert_eq!(output, PathBuf::from("all.csv"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
