//! JSON bodies exchanged on the endpoint surface

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status code plus JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Serialize `body` under `status`
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        let body = serde_json::to_value(body).unwrap_or_else(|e| {
            serde_json::json!({ "error": "Failed to serialize response", "details": e.to_string() })
        });
        Self { status, body }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `200` body of `POST /api/upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSuccess {
    pub processed_image_url: String,
}

/// Failure body shared by all endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new<S: Into<String>>(error: S) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Body of `POST /api/test-bg-removal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalTestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub method: String,
    pub success: bool,
}

/// Read an upload answer the way the batch page does
///
/// A failure message prefers `details`, then `error`, then `Failed: <status>`.
/// A success without `processedImageUrl` is a failure too.
///
/// # Errors
/// The per-item error message to show
pub fn interpret_upload_response(status: u16, body: &Value) -> Result<String, String> {
    if !(200..300).contains(&status) {
        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        return Err(field("details")
            .or_else(|| field("error"))
            .unwrap_or_else(|| format!("Failed: {}", status)));
    }

    body.get("processedImageUrl")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| "No processed image URL returned".to_string())
}
