use std::path::{Path, PathBuf};

/// Records buffered between flushes.
pub const DUMP_FREQUENCY: usize = 10;
/// Page size for `messages.list` (the API maximum).
pub const MAX_RESULTS_PER_PAGE: usize = 500;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LABEL: &str = "INBOX";
pub const CLIENT_SECRET_FILE: &str = "client_secret.json";

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub data_dir: PathBuf,
    pub dump_frequency: usize,
    pub max_results_per_page: usize,
    pub label_ids: Vec<String>,
    pub client_secret_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            dump_frequency: DUMP_FREQUENCY,
            max_results_per_page: MAX_RESULTS_PER_PAGE,
            label_ids: vec![DEFAULT_LABEL.to_string()],
            client_secret_path: PathBuf::from(CLIENT_SECRET_FILE),
        }
    }
}

impl ExportConfig {
    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    pub fn with_dump_frequency(mut self, dump_frequency: usize) -> Self {
        self.dump_frequency = dump_frequency.max(1);
        self
    }

    pub fn emails_dir(&self) -> PathBuf {
        self.data_dir.join("emails")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.emails_dir().join("checkpoints")
    }
}
