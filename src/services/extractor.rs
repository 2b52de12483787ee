//! Reads the `candidates[0].content.parts` shape returned by the multimodal
//! provider. Every reply path that uses this shape goes through here.

use serde_json::Value;

use crate::models::{ErrorKind, ExtractedPayload, Failure, InlineMedia};

const DEFAULT_MEDIA_MIME: &str = "image/png";

/// Pull the first text or inline-media fragment out of a provider reply.
///
/// Missing nodes along the way yield an empty payload. Only a body that is not
/// JSON at all is reported as a `ParseError`.
pub fn extract(raw_body: &str) -> Result<ExtractedPayload, Failure> {
    let root = parse_body(raw_body)?;

    let Some(part) = first_candidate_parts(&root).and_then(|parts| parts.first()) else {
        log::debug!("Reply has no candidates[0].content.parts[0], returning empty payload");
        return Ok(ExtractedPayload::default());
    };

    if let Some(text) = part.get("text").and_then(Value::as_str) {
        return Ok(ExtractedPayload {
            text: Some(text.to_string()),
            inline_media: None,
        });
    }

    Ok(ExtractedPayload {
        text: None,
        inline_media: inline_media_of(part),
    })
}

/// First inline-media part of the first candidate, wherever it sits in the
/// part list. Image replies usually lead with a text part.
pub fn first_inline_media(raw_body: &str) -> Result<Option<InlineMedia>, Failure> {
    let root = parse_body(raw_body)?;

    Ok(first_candidate_parts(&root)
        .and_then(|parts| parts.iter().find_map(inline_media_of)))
}

fn parse_body(raw_body: &str) -> Result<Value, Failure> {
    serde_json::from_str(raw_body).map_err(|e| {
        Failure::new(
            ErrorKind::ParseError,
            format!("provider reply is not valid JSON: {}", e),
        )
    })
}

fn first_candidate_parts(root: &Value) -> Option<&Vec<Value>> {
    root.get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()
}

fn inline_media_of(part: &Value) -> Option<InlineMedia> {
    let inline = part.get("inlineData").or_else(|| part.get("inline_data"))?;
    let data = inline.get("data").and_then(Value::as_str)?;

    let mime_type = inline
        .get("mimeType")
        .or_else(|| inline.get("mime_type"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_MEDIA_MIME);

    Some(InlineMedia {
        mime_type: mime_type.to_string(),
        base64_data: data.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_part() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Merhaba"}]}}]}"#;
        let payload = extract(body).unwrap();

        assert_eq!(payload.text.as_deref(), Some("Merhaba"));
        assert!(payload.inline_media.is_none());
    }

    #[test]
    fn test_extract_inline_media_part() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"inlineData":{"mimeType":"image/jpeg","data":"aGVsbG8="}}
        ]}}]}"#;
        let payload = extract(body).unwrap();

        assert!(payload.text.is_none());
        let media = payload.inline_media.unwrap();
        assert_eq!(media.mime_type, "image/jpeg");
        assert_eq!(media.base64_data, "aGVsbG8=");
    }

    #[test]
    fn test_missing_candidates_is_empty_not_error() {
        for body in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{}}]}}]}"#,
            r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#,
        ] {
            let payload = extract(body).unwrap();
            assert!(payload.is_empty(), "expected empty payload for {}", body);
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let failure = extract("<html>502 Bad Gateway</html>").unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ParseError);
    }

    #[test]
    fn test_first_inline_media_skips_leading_text() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"text":"Here is your cat"},
            {"inlineData":{"mimeType":"image/png","data":"AAEC"}}
        ]}}]}"#;

        let media = first_inline_media(body).unwrap().unwrap();
        assert_eq!(media.base64_data, "AAEC");

        // extract() still only looks at the first part
        assert_eq!(extract(body).unwrap().text.as_deref(), Some("Here is your cat"));
    }

    #[test]
    fn test_first_inline_media_absent() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"no image today"}]}}]}"#;
        assert!(first_inline_media(body).unwrap().is_none());
    }
}
