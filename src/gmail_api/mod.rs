//! Gmail API module split into logical submodules
//!
//! This module provides the mailbox side of the export organized into:
//! - auth: Credential provider backed by the keyring and the OAuth flow
//! - client: Authorized HTTP client and the `MessageSource` implementation
//! - labels: Label fetching operations
//! - messages: Message listing (with pagination) and full message fetching

pub mod auth;
pub mod client;
pub mod labels;
pub mod messages;

use crate::error::ExternalServiceError;
use crate::types::{Label, Message, MessagesResponse};
use async_trait::async_trait;

pub use auth::{CredentialProvider, Credentials, KeyringCredentialProvider};
pub use auth::{KEYRING_SERVICE_NAME, KEYRING_USERNAME};
pub use client::GmailClient;
pub use messages::list_message_ids;

// Re-export traits for testing (when needed)
#[cfg(test)]
pub use auth::{KeyringEntry, OAuthFlow};

/// A paginated message store. The exporter and the pagination logic only
/// talk to the mailbox through this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// One page of message references. `label_ids` may be empty.
    async fn list_message_page(
        &self,
        label_ids: &[String],
        page_token: Option<String>,
        max_results: usize,
    ) -> Result<MessagesResponse, ExternalServiceError>;

    async fn get_message_detail(&self, id: &str) -> Result<Message, ExternalServiceError>;

    async fn list_labels(&self) -> Result<Vec<Label>, ExternalServiceError>;
}
