use super::auth::Credentials;
use super::MessageSource;
use crate::error::ExternalServiceError;
use crate::types::{Label, Message, MessagesResponse};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Authorized Gmail REST client.
pub struct GmailClient {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl GmailClient {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self::with_base_url(client, credentials, GMAIL_API_BASE)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        credentials: Credentials,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    // GET an endpoint and decode its JSON body; failures are logged here
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExternalServiceError> {
        let result = self.send_get(endpoint, query).await;
        if let Err(e) = &result {
            tracing::error!("An error occurred: {}", e);
        }
        result
    }

    async fn send_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExternalServiceError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .bearer_auth(self.credentials.access_token())
            .query(query)
            .send()
            .await
            .map_err(|source| ExternalServiceError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExternalServiceError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ExternalServiceError::Decode {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}

#[async_trait]
impl MessageSource for GmailClient {
    async fn list_message_page(
        &self,
        label_ids: &[String],
        page_token: Option<String>,
        max_results: usize,
    ) -> Result<MessagesResponse, ExternalServiceError> {
        self.fetch_message_page(label_ids, page_token, max_results)
            .await
    }

    async fn get_message_detail(&self, id: &str) -> Result<Message, ExternalServiceError> {
        self.fetch_full_message(id).await
    }

    async fn list_labels(&self) -> Result<Vec<Label>, ExternalServiceError> {
        self.fetch_labels().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = GmailClient::with_base_url(
            reqwest::Client::new(),
            Credentials::new("token"),
            "http://localhost:9999/gmail/v1/users/me/",
        );
        assert_eq!(
            client.url("messages"),
            "http://localhost:9999/gmail/v1/users/me/messages"
        );
    }
}
