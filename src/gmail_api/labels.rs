use super::GmailClient;
use crate::error::ExternalServiceError;
use crate::types::{Label, LabelsResponse};

impl GmailClient {
    // Helper function to fetch labels
    pub async fn fetch_labels(&self) -> Result<Vec<Label>, ExternalServiceError> {
        let labels_data: LabelsResponse = self.get_json("labels", &[]).await?;
        Ok(labels_data.labels.unwrap_or_default())
    }
}
