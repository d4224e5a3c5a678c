use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
pub struct LabelsResponse {
    pub labels: Option<Vec<Label>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Label {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct MessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "resultSizeEstimate")]
    pub result_size_estimate: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
}

/// A full Gmail message resource as returned by `messages.get?format=full`.
///
/// Fields the exporter does not know about are kept in `metadata` and passed
/// through to the output untouched.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    #[serde(rename = "labelIds", default)]
    pub label_ids: Vec<String>,
    pub snippet: Option<String>,
    #[serde(rename = "historyId")]
    pub history_id: Option<String>,
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
    #[serde(rename = "sizeEstimate")]
    pub size_estimate: Option<u64>,
    pub payload: Option<MessagePart>,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct MessagePart {
    #[serde(rename = "partId", skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<MessagePartBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Header {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct MessagePartBody {
    #[serde(rename = "attachmentId", skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Label id -> display name, built once per run.
#[derive(Debug, Default, Clone)]
pub struct LabelMap {
    names: HashMap<String, String>,
}

impl LabelMap {
    pub fn from_labels(labels: &[Label]) -> Self {
        let names = labels
            .iter()
            .filter_map(|label| match (&label.id, &label.name) {
                (Some(id), Some(name)) => Some((id.clone(), name.clone())),
                _ => None,
            })
            .collect();
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    // Unknown ids pass through unchanged
    pub fn resolve(&self, label_ids: &[String]) -> Vec<String> {
        label_ids
            .iter()
            .map(|id| self.names.get(id).cloned().unwrap_or_else(|| id.clone()))
            .collect()
    }
}

/// One processed message, ready to be written as a CSV row.
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub message: Message,
    pub body: String,
    pub labels: Vec<String>,
}

impl ExportRecord {
    pub const COLUMNS: [&'static str; 11] = [
        "id",
        "threadId",
        "labelIds",
        "snippet",
        "historyId",
        "internalDate",
        "sizeEstimate",
        "payload",
        "metadata",
        "body",
        "labels",
    ];

    pub fn new(message: Message, body: String, labels: Vec<String>) -> Self {
        Self {
            message,
            body,
            labels,
        }
    }

    /// Cell values in `COLUMNS` order. Lists and objects render as compact JSON.
    pub fn to_row(&self) -> Vec<String> {
        let message = &self.message;
        vec![
            message.id.clone(),
            message.thread_id.clone().unwrap_or_default(),
            json_cell(&message.label_ids),
            message.snippet.clone().unwrap_or_default(),
            message.history_id.clone().unwrap_or_default(),
            message.internal_date.clone().unwrap_or_default(),
            message
                .size_estimate
                .map(|size| size.to_string())
                .unwrap_or_default(),
            message.payload.as_ref().map(json_cell).unwrap_or_default(),
            if message.metadata.is_empty() {
                String::new()
            } else {
                json_cell(&message.metadata)
            },
            self.body.clone(),
            json_cell(&self.labels),
        ]
    }
}

fn json_cell<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
