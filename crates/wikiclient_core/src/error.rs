use serde_json::Value;
use thiserror::Error;

use crate::api::ProtocolVersion;
use crate::session::WireResponse;

/// Failure modes of a wiki API call. Every variant is terminal for the call
/// or lazy sequence it occurs in; nothing is retried internally.
#[derive(Debug, Error)]
pub enum WikiError {
    /// The wiki answered with a non-success HTTP status.
    #[error("HTTP status {status}")]
    Transport { status: u16 },

    /// The response body carried a platform-reported error.
    #[error("API error [{code}]: {info}")]
    Api { code: String, info: String },

    /// The platform refused to delete the page.
    #[error("page cannot be deleted: {0}")]
    DeletionDenied(String),

    /// The login handshake ended with a non-success result.
    #[error("login failed: {result}")]
    Authentication { result: String },

    /// The operation does not exist on this protocol generation.
    #[error("{operation} is not supported by MediaWiki API {version}")]
    Unsupported {
        operation: &'static str,
        version: ProtocolVersion,
    },

    /// The HTTP exchange failed before a status was available.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the JSON we asked for.
    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response decoded but is missing a required payload.
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),
}

/// Check the transport status, then decode the body.
pub fn classify_response(response: WireResponse) -> Result<Value, WikiError> {
    if !(200..300).contains(&response.status) {
        return Err(WikiError::Transport {
            status: response.status,
        });
    }
    Ok(serde_json::from_str(&response.body)?)
}

/// Surface the platform-reported error carried in `payload`, if any.
/// `cantdelete` specializes to [`WikiError::DeletionDenied`].
pub fn check_api_error(payload: &Value) -> Result<(), WikiError> {
    let Some(error) = payload.get("error") else {
        return Ok(());
    };
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error")
        .to_string();
    let info = error
        .get("info")
        .and_then(Value::as_str)
        .unwrap_or("unknown info")
        .to_string();
    if code == "cantdelete" {
        return Err(WikiError::DeletionDenied(info));
    }
    Err(WikiError::Api { code, info })
}

/// Escalate a warning field to a hard failure. Applied to login and token
/// exchanges only, where a warning can mask a deprecated-parameter fallback
/// that silently breaks authentication. Both the 1.19 `warning` spelling
/// and the modern `warnings` object are recognized.
pub fn reject_warnings(payload: &Value) -> Result<(), WikiError> {
    let Some(warning) = payload.get("warnings").or_else(|| payload.get("warning")) else {
        return Ok(());
    };
    Err(WikiError::Api {
        code: "warnings".to_string(),
        info: warning.to_string(),
    })
}
