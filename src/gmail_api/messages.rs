use super::{GmailClient, MessageSource};
use crate::error::ExternalServiceError;
use crate::types::{Message, MessageRef, MessagesResponse};

impl GmailClient {
    // One page of `messages.list`
    pub async fn fetch_message_page(
        &self,
        label_ids: &[String],
        page_token: Option<String>,
        max_results: usize,
    ) -> Result<MessagesResponse, ExternalServiceError> {
        let mut query: Vec<(&str, String)> = vec![("maxResults", max_results.to_string())];
        query.extend(label_ids.iter().map(|id| ("labelIds", id.clone())));
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.get_json("messages", &query).await
    }

    // Helper function to fetch full message content and headers
    pub async fn fetch_full_message(&self, msg_id: &str) -> Result<Message, ExternalServiceError> {
        self.get_json(
            &format!("messages/{}", msg_id),
            &[("format", "full".to_string())],
        )
        .await
    }
}

/// List every message reference matching `label_ids`, following page tokens.
///
/// Only the first request carries the label filter; continuation requests send
/// the page token alone. References come back in fetch order and are not
/// deduplicated.
pub async fn list_message_ids<S: MessageSource + ?Sized>(
    source: &S,
    label_ids: &[String],
    max_results: usize,
) -> Result<Vec<MessageRef>, ExternalServiceError> {
    let mut results = source.list_message_page(label_ids, None, max_results).await?;
    let mut message_list = results.messages.take().unwrap_or_default();
    let mut iter_num = 1;

    while let Some(token) = results.next_page_token.take() {
        iter_num += 1;
        results = source
            .list_message_page(&[], Some(token), max_results)
            .await?;
        message_list.extend(results.messages.take().unwrap_or_default());
    }

    tracing::info!("Total Number of iterations = {}", iter_num);
    tracing::info!("Total Number of mails fetched = {}", message_list.len());

    Ok(message_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail_api::MockMessageSource;
    use mockall::Sequence;

    fn page(ids: &[&str], next: Option<&str>) -> MessagesResponse {
        MessagesResponse {
            messages: Some(
                ids.iter()
                    .map(|id| MessageRef {
                        id: id.to_string(),
                        thread_id: Some(format!("t-{}", id)),
                    })
                    .collect(),
            ),
            next_page_token: next.map(str::to_string),
            result_size_estimate: None,
        }
    }

    #[tokio::test]
    async fn test_single_page() {
        let mut source = MockMessageSource::new();
        source
            .expect_list_message_page()
            .withf(|labels, token, max| labels == ["INBOX"] && token.is_none() && *max == 500)
            .times(1)
            .returning(|_, _, _| Ok(page(&["a", "b"], None)));

        let ids = list_message_ids(&source, &["INBOX".to_string()], 500)
            .await
            .unwrap();
        let ids: Vec<&str> = ids.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_follows_tokens_and_drops_label_filter() {
        let mut source = MockMessageSource::new();
        let mut seq = Sequence::new();
        source
            .expect_list_message_page()
            .withf(|labels, token, _| labels == ["INBOX"] && token.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(&["a", "b"], Some("p2"))));
        source
            .expect_list_message_page()
            .withf(|labels, token, _| labels.is_empty() && token.as_deref() == Some("p2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(&["c", "b"], Some("p3"))));
        source
            .expect_list_message_page()
            .withf(|labels, token, _| labels.is_empty() && token.as_deref() == Some("p3"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(page(&["d"], None)));

        let ids = list_message_ids(&source, &["INBOX".to_string()], 2)
            .await
            .unwrap();
        let ids: Vec<&str> = ids.iter().map(|m| m.id.as_str()).collect();
        // Duplicates from the service are kept as-is
        assert_eq!(ids, vec!["a", "b", "c", "b", "d"]);
    }

    #[tokio::test]
    async fn test_empty_mailbox() {
        let mut source = MockMessageSource::new();
        source
            .expect_list_message_page()
            .returning(|_, _, _| Ok(MessagesResponse::default()));

        let ids = list_message_ids(&source, &[], 500).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_page_failure_propagates() {
        let mut source = MockMessageSource::new();
        source
            .expect_list_message_page()
            .withf(|_, token, _| token.is_none())
            .returning(|_, _, _| Ok(page(&["a"], Some("p2"))));
        source
            .expect_list_message_page()
            .withf(|_, token, _| token.is_some())
            .returning(|_, _, _| {
                Err(ExternalServiceError::Status {
                    endpoint: "messages".to_string(),
                    status: 503,
                    body: "backend unavailable".to_string(),
                })
            });

        let result = list_message_ids(&source, &["INBOX".to_string()], 500).await;
        assert!(matches!(
            result,
            Err(ExternalServiceError::Status { status: 503, .. })
        ));
    }
}
