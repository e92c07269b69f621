//! Civo API client error types

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Civo API error ({status}): {code}: {reason}")]
    Api {
        status: u16,
        code: String,
        reason: String,
    },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid API endpoint '{0}'")]
    InvalidEndpoint(String),
}

impl ClientError {
    /// True when the object does not exist (HTTP 404 or a `*_not_found` code)
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::Api { status, code, .. } => *status == 404 || code.ends_with("not_found"),
            _ => false,
        }
    }

    /// Build an API error from a non-success response body
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            code: String,
            #[serde(default)]
            reason: String,
        }

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.code.is_empty() || !parsed.reason.is_empty() => ClientError::Api {
                status,
                code: parsed.code,
                reason: parsed.reason,
            },
            _ => ClientError::Api {
                status,
                code: "unknown_error".to_string(),
                reason: body.trim().to_string(),
            },
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_error_body() {
        let err = ClientError::from_response(
            404,
            r#"{"code":"database_instance_not_found","reason":"The requested instance could not be found"}"#,
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Civo API error (404): database_instance_not_found: The requested instance could not be found"
        );
    }

    #[test]
    fn not_found_by_code_with_other_status() {
        let err = ClientError::from_response(400, r#"{"code":"database_network_not_found"}"#);
        assert!(err.is_not_found());

        let err = ClientError::from_response(500, "gateway timeout");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("gateway timeout"));
    }
}
