pub mod app;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod email_content;
pub mod error;
pub mod exporter;
pub mod gmail_api;
pub mod output;
pub mod prompt;
pub mod types;
