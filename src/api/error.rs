use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    pub fn not_found(schema_id: &str) -> Self {
        Self::Api {
            status: StatusCode::NOT_FOUND.as_u16(),
            message: format!("Schema with id '{}' not found", schema_id),
        }
    }

    /// HTTP status of a server-side failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Deserialize(_) => None,
        }
    }

    /// Build the error for a non-2xx response from its status and raw body.
    ///
    /// A 422 `detail` list is flattened to `loc.a.b: msg, ...`. Otherwise the
    /// server's `detail` is used, then the status text. A body that is not
    /// JSON at all reads as "Unknown error".
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<Value>(body) {
            Err(_) => "Unknown error".to_string(),
            Ok(parsed) => match parsed.get("detail") {
                Some(Value::Array(items)) if status == StatusCode::UNPROCESSABLE_ENTITY => items
                    .iter()
                    .map(validation_entry)
                    .collect::<Vec<_>>()
                    .join(", "),
                Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
                Some(detail) if !detail.is_null() => detail.to_string(),
                _ => status.canonical_reason().unwrap_or("Unknown error").to_string(),
            },
        };

        Self::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// `{"loc": ["body", "tables", 0], "msg": "..."}` -> `body.tables.0: ...`
fn validation_entry(entry: &Value) -> String {
    let loc = entry
        .get("loc")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|p| match p {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    let msg = entry.get("msg").and_then(Value::as_str).unwrap_or_default();
    format!("{}: {}", loc, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: ApiError) -> String {
        match err {
            ApiError::Api { message, .. } => message,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_errors_are_flattened() {
        let body = r#"{"detail": [
            {"loc": ["body", "name"], "msg": "field required", "type": "missing"},
            {"loc": ["body", "tables", 0, "columns"], "msg": "not a list"}
        ]}"#;
        let err = ApiError::from_response(StatusCode::UNPROCESSABLE_ENTITY, body);

        assert_eq!(err.status(), Some(422));
        assert_eq!(
            message(err),
            "body.name: field required, body.tables.0.columns: not a list"
        );
    }

    #[test]
    fn test_detail_string_is_used() {
        let body = r#"{"detail": "Schema with id 'x' not found"}"#;
        let err = ApiError::from_response(StatusCode::NOT_FOUND, body);

        assert_eq!(message(err), "Schema with id 'x' not found");
    }

    #[test]
    fn test_missing_detail_uses_status_text() {
        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "{}");

        assert_eq!(message(err), "Internal Server Error");
    }

    #[test]
    fn test_non_json_body() {
        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");

        assert_eq!(err.status(), Some(502));
        assert_eq!(message(err), "Unknown error");
    }

    #[test]
    fn test_display_includes_status() {
        let err = ApiError::not_found("abc");

        assert_eq!(
            err.to_string(),
            "API error (status 404): Schema with id 'abc' not found"
        );
    }
}
