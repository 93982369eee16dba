//! Response classification: one pure choke point between raw HTTP responses
//! and everything the console renders.

use reqwest::StatusCode;
use serde_json::Value;

use crate::RunnerClientError;

/// A successfully processed response body: JSON when the server sent JSON,
/// raw text when it declared a text-like type or the JSON claim was a lie.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Text(String),
}

impl ParsedBody {
    /// The body as a JSON value; text becomes a JSON string.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// The body as display text: raw text as-is, JSON re-serialized.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text,
        }
    }
}

/// Classify a complete response. Status 401 short-circuits before any body
/// interpretation; other failures extract the best error text the body
/// offers; successes are decoded per the declared content type, falling back
/// to text when a JSON claim does not parse.
pub fn process_response(
    status: StatusCode,
    content_type: &str,
    body: &[u8],
) -> Result<ParsedBody, RunnerClientError> {
    if !status.is_success() {
        return Err(failure_error(status, body));
    }
    if is_text_like(content_type) {
        return Ok(ParsedBody::Text(
            String::from_utf8_lossy(body).into_owned(),
        ));
    }
    match serde_json::from_slice(body) {
        Ok(value) => Ok(ParsedBody::Json(value)),
        Err(_) => Ok(ParsedBody::Text(
            String::from_utf8_lossy(body).into_owned(),
        )),
    }
}

/// The error a failed status maps to, with best-effort message extraction
/// from the body.
pub(crate) fn failure_error(status: StatusCode, body: &[u8]) -> RunnerClientError {
    if status == StatusCode::UNAUTHORIZED {
        return RunnerClientError::Unauthenticated;
    }
    RunnerClientError::RequestFailed {
        status,
        message: error_message(status, body),
    }
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if let Some(Value::String(message)) = map.get("message") {
            if !message.is_empty() {
                return message.clone();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        text.to_string()
    }
}

fn is_text_like(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/") || essence == "application/javascript"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_401_short_circuits_regardless_of_body() {
        let error = process_response(
            StatusCode::UNAUTHORIZED,
            "application/json",
            br#"{"message":"ignored"}"#,
        )
        .expect_err("401 must fail");
        assert!(matches!(error, RunnerClientError::Unauthenticated));
        assert_eq!(error.to_string(), "Unauthenticated");
    }

    #[test]
    fn failure_extracts_json_message_field() {
        let error = process_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "application/json",
            br#"{"message":"boom"}"#,
        )
        .expect_err("500 must fail");
        match error {
            RunnerClientError::RequestFailed { status, message } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failure_falls_back_to_plain_text_body() {
        let error = process_response(StatusCode::BAD_GATEWAY, "text/plain", b" gateway died ")
            .expect_err("502 must fail");
        match error {
            RunnerClientError::RequestFailed { message, .. } => {
                assert_eq!(message, "gateway died");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failure_with_empty_body_uses_generic_status_text() {
        let error = process_response(StatusCode::SERVICE_UNAVAILABLE, "", b"")
            .expect_err("503 must fail");
        match error {
            RunnerClientError::RequestFailed { message, .. } => {
                assert_eq!(message, "status 503");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failure_with_empty_message_field_falls_back_to_text() {
        let error = process_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "application/json",
            br#"{"message":""}"#,
        )
        .expect_err("500 must fail");
        match error {
            RunnerClientError::RequestFailed { message, .. } => {
                assert_eq!(message, r#"{"message":""}"#);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn text_content_type_is_not_parsed_as_json() {
        let parsed = process_response(StatusCode::OK, "text/plain; charset=utf-8", b"v0.0.1")
            .expect("success");
        assert_eq!(parsed, ParsedBody::Text("v0.0.1".to_string()));
    }

    #[test]
    fn javascript_content_type_counts_as_text() {
        let parsed = process_response(StatusCode::OK, "application/javascript", b"let x = 1;")
            .expect("success");
        assert_eq!(parsed, ParsedBody::Text("let x = 1;".to_string()));
    }

    #[test]
    fn json_content_type_parses_into_a_value() {
        let parsed = process_response(
            StatusCode::OK,
            "application/json",
            br#"{"version":"v0.0.1"}"#,
        )
        .expect("success");
        assert_eq!(parsed, ParsedBody::Json(json!({"version": "v0.0.1"})));
    }

    #[test]
    fn mislabeled_json_falls_back_to_text() {
        let parsed =
            process_response(StatusCode::OK, "application/json", b"plain words").expect("success");
        assert_eq!(parsed, ParsedBody::Text("plain words".to_string()));
    }

    #[test]
    fn parsed_body_conversions() {
        assert_eq!(
            ParsedBody::Text("hi".to_string()).into_json(),
            Value::String("hi".to_string())
        );
        assert_eq!(ParsedBody::Json(json!({"a": 1})).into_text(), r#"{"a":1}"#);
    }
}
