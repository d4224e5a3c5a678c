use crate::types::MessagePart;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::Engine;
use scraper::Html;

/// Body text recorded when a payload cannot be decoded.
pub const UNPARSEABLE_BODY: &str = "Unable to Parse";

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("payload is missing")]
    MissingPayload,
    #[error("part has no mimeType")]
    MissingMimeType,
    #[error("{0} part has no body data")]
    MissingData(String),
    #[error("invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// How a MIME node takes part in text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    PlainText,
    Html,
    /// `multipart/alternative` or `multipart/related`
    NestedMultipart,
    /// Any other `multipart/*`, only walked at the root
    OtherMultipart,
    Other,
}

impl PartKind {
    fn of(mime_type: &str) -> Self {
        match mime_type {
            "text/plain" => PartKind::PlainText,
            "text/html" => PartKind::Html,
            "multipart/alternative" | "multipart/related" => PartKind::NestedMultipart,
            m if m.starts_with("multipart/") => PartKind::OtherMultipart,
            _ => PartKind::Other,
        }
    }
}

// Parse an email payload, normalize the text, and fall back to the sentinel
// on any failure
pub fn parse_with_error_handling(payload: Option<&MessagePart>) -> String {
    match payload
        .ok_or(ExtractionError::MissingPayload)
        .and_then(extract)
    {
        Ok(text) => clean_text(&text),
        Err(e) => {
            tracing::debug!("Body extraction failed: {}", e);
            UNPARSEABLE_BODY.to_string()
        }
    }
}

// Extract raw text from the root of a payload tree
pub fn extract(payload: &MessagePart) -> Result<String, ExtractionError> {
    let mime_type = payload
        .mime_type
        .as_deref()
        .ok_or(ExtractionError::MissingMimeType)?;

    match PartKind::of(mime_type) {
        PartKind::PlainText => decode_part(payload, mime_type),
        PartKind::Html => Ok(html_to_text(&decode_part(payload, mime_type)?)),
        PartKind::NestedMultipart | PartKind::OtherMultipart => {
            find_text_part(payload.parts.as_deref().unwrap_or_default())
        }
        PartKind::Other => Ok(String::new()),
    }
}

// Collect text from the children of a multipart node
fn find_text_part(parts: &[MessagePart]) -> Result<String, ExtractionError> {
    let mut text = String::new();
    for part in parts {
        let kind = part
            .mime_type
            .as_deref()
            .map(PartKind::of)
            .unwrap_or(PartKind::Other);

        match kind {
            PartKind::PlainText => {
                // Children without inline data (e.g. empty parts) are skipped
                if let Some(decoded) = decode_child(part)? {
                    text.push(' ');
                    if is_html_text(&decoded) {
                        text.push_str(&html_to_text(&decoded));
                    } else {
                        text.push_str(&decoded);
                    }
                }
            }
            PartKind::Html => {
                if let Some(decoded) = decode_child(part)? {
                    text.push(' ');
                    text.push_str(&html_to_text(&decoded));
                }
            }
            PartKind::NestedMultipart => {
                text.push(' ');
                text.push_str(&find_text_part(
                    part.parts.as_deref().unwrap_or_default(),
                )?);
            }
            PartKind::OtherMultipart | PartKind::Other => {}
        }
    }
    Ok(text)
}

fn decode_part(part: &MessagePart, mime_type: &str) -> Result<String, ExtractionError> {
    let data = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .ok_or_else(|| ExtractionError::MissingData(mime_type.to_string()))?;
    base64url_decode(data)
}

fn decode_child(part: &MessagePart) -> Result<Option<String>, ExtractionError> {
    match part.body.as_ref().and_then(|b| b.data.as_deref()) {
        Some(data) if !data.is_empty() => base64url_decode(data).map(Some),
        _ => Ok(None),
    }
}

/// Decode Gmail's web-safe base64, tolerating missing or partial padding.
pub fn base64url_decode(data: &str) -> Result<String, ExtractionError> {
    let trimmed = data.trim_end_matches('=');
    let mut padded = String::with_capacity(trimmed.len() + 3);
    padded.push_str(trimmed);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let bytes = URL_SAFE.decode(padded.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

/// Whether the text contains at least one HTML element.
pub fn is_html_text(text: &str) -> bool {
    let fragment = Html::parse_fragment(text);
    fragment
        .root_element()
        .descendants()
        .skip(1)
        .any(|node| node.value().is_element())
}

/// All text nodes of an HTML document joined by single spaces.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Replace non-ASCII characters with spaces and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let ascii: String = text
        .chars()
        .map(|c| if (c as u32) < 128 { c } else { ' ' })
        .collect();
    ascii.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessagePartBody;

    fn create_message_part(
        mime_type: &str,
        data: Option<&str>,
        parts: Option<Vec<MessagePart>>,
    ) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: data.map(|d| MessagePartBody {
                data: Some(URL_SAFE.encode(d)),
                ..Default::default()
            }),
            parts,
            ..Default::default()
        }
    }

    fn parse(part: &MessagePart) -> String {
        parse_with_error_handling(Some(part))
    }

    #[test]
    fn test_plain_text_round_trip() {
        let payload = create_message_part("text/plain", Some("Hello World"), None);
        assert_eq!(parse(&payload), "Hello World");
    }

    #[test]
    fn test_plain_text_root_is_not_sniffed_for_html() {
        let payload = create_message_part("text/plain", Some("<b>bold</b>"), None);
        assert_eq!(extract(&payload).unwrap(), "<b>bold</b>");
    }

    #[test]
    fn test_html_is_stripped() {
        let payload = create_message_part("text/html", Some("<p>Hi <b>there</b></p>"), None);
        assert_eq!(parse(&payload), "Hi there");
    }

    #[test]
    fn test_multipart_alternative_keeps_order() {
        let plain = create_message_part("text/plain", Some("A"), None);
        let html = create_message_part("text/html", Some("<i>B</i>"), None);
        let payload = create_message_part("multipart/alternative", None, Some(vec![plain, html]));
        assert_eq!(parse(&payload), "A B");
    }

    #[test]
    fn test_plain_child_with_markup_is_stripped() {
        let plain = create_message_part("text/plain", Some("<div>Sneaky <span>html</span></div>"), None);
        let payload = create_message_part("multipart/mixed", None, Some(vec![plain]));
        assert_eq!(parse(&payload), "Sneaky html");
    }

    #[test]
    fn test_nested_related_is_walked_and_attachments_ignored() {
        let inner_html = create_message_part("text/html", Some("<p>inner</p>"), None);
        let image = create_message_part("image/png", Some("\u{89}PNG"), None);
        let related = create_message_part(
            "multipart/related",
            None,
            Some(vec![inner_html, image]),
        );
        let pdf = create_message_part("application/pdf", Some("%PDF"), None);
        let payload = create_message_part("multipart/mixed", None, Some(vec![related, pdf]));
        assert_eq!(parse(&payload), "inner");
    }

    #[test]
    fn test_nested_mixed_child_is_ignored() {
        let deep = create_message_part("text/plain", Some("hidden"), None);
        let mixed = create_message_part("multipart/mixed", None, Some(vec![deep]));
        let top = create_message_part("text/plain", Some("shown"), None);
        let payload = create_message_part("multipart/mixed", None, Some(vec![top, mixed]));
        assert_eq!(parse(&payload), "shown");
    }

    #[test]
    fn test_multipart_without_text_is_empty() {
        let image = create_message_part("image/jpeg", Some("jpeg"), None);
        let payload = create_message_part("multipart/mixed", None, Some(vec![image]));
        assert_eq!(parse(&payload), "");

        let no_parts = create_message_part("multipart/alternative", None, None);
        assert_eq!(parse(&no_parts), "");
    }

    #[test]
    fn test_other_root_type_is_empty() {
        let payload = create_message_part("application/octet-stream", Some("bin"), None);
        assert_eq!(parse(&payload), "");
    }

    #[test]
    fn test_malformed_payloads_fall_back() {
        let missing_data = MessagePart {
            mime_type: Some("text/plain".to_string()),
            ..Default::default()
        };
        assert_eq!(parse(&missing_data), UNPARSEABLE_BODY);

        let bad_base64 = MessagePart {
            mime_type: Some("text/html".to_string()),
            body: Some(MessagePartBody {
                data: Some("***not base64***".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(parse(&bad_base64), UNPARSEABLE_BODY);

        let no_mime = MessagePart::default();
        assert_eq!(parse(&no_mime), UNPARSEABLE_BODY);

        assert_eq!(parse_with_error_handling(None), UNPARSEABLE_BODY);
    }

    #[test]
    fn test_invalid_utf8_falls_back() {
        let payload = MessagePart {
            mime_type: Some("text/plain".to_string()),
            body: Some(MessagePartBody {
                data: Some(URL_SAFE.encode([0xff, 0xfe, 0xfd])),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(parse(&payload), UNPARSEABLE_BODY);
    }

    #[test]
    fn test_bad_child_poisons_whole_body() {
        let good = create_message_part("text/plain", Some("fine"), None);
        let bad = MessagePart {
            mime_type: Some("text/plain".to_string()),
            body: Some(MessagePartBody {
                data: Some("!!!!".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let payload = create_message_part("multipart/alternative", None, Some(vec![good, bad]));
        assert_eq!(parse(&payload), UNPARSEABLE_BODY);
    }

    #[test]
    fn test_base64url_decode_accepts_unpadded_and_padded() {
        assert_eq!(base64url_decode("SGk").unwrap(), "Hi");
        assert_eq!(base64url_decode("SGk=").unwrap(), "Hi");
        assert_eq!(base64url_decode("SGVsbG8").unwrap(), "Hello");
        // '-' and '_' are the web-safe alphabet
        assert_eq!(base64url_decode("Pz8_").unwrap(), "???");
    }

    #[test]
    fn test_clean_text_replaces_non_ascii_and_collapses() {
        assert_eq!(clean_text("caf\u{e9}\tnoir\n\n  ok"), "caf noir ok");
        assert_eq!(clean_text("a\u{2014}b"), "a b");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_is_html_text() {
        assert!(is_html_text("<p>hello</p>"));
        assert!(is_html_text("text with <br> break"));
        assert!(!is_html_text("1 < 2 and 3 > 2"));
        assert!(!is_html_text("plain words"));
    }
}
