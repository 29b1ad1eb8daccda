//! Response bodies returned by the HTTP surface.

use crate::schema::ExtractedRecord;
use serde::{Deserialize, Serialize};

/// Upload succeeded and the record was analysed (and possibly empty).
pub const MSG_ANALYZED: &str = "File uploaded and analyzed successfully";

/// Upload, analysis and persistence all succeeded.
pub const MSG_STORED: &str = "File uploaded, analyzed, and stored successfully";

/// Analysis succeeded but the document store rejected the record.
pub const MSG_STORE_FAILED: &str =
    "File uploaded and analyzed successfully, but failed to store data";

/// The model refused to analyse the image.
pub const MSG_BLOCKED: &str =
    "File uploaded, but analysis was blocked by the model's safety filters";

/// Body of a `200` reply from `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    /// Public URL of the stored image.
    pub url: String,
    /// Extracted fields; `{}` when blocked, unparseable, or the insert failed.
    pub json_data: ExtractedRecord,
    /// Identifier assigned by the document store, when persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Body of a `200` reply from `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of every `4xx`/`5xx` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub storage: bool,
    pub database: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_omitted_when_absent() {
        let body = UploadResponse {
            message: MSG_ANALYZED.into(),
            url: "https://ids.s3.amazonaws.com/a.png".into(),
            json_data: ExtractedRecord::empty(),
            document_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("document_id").is_none());
        assert_eq!(json["json_data"], serde_json::json!({}));
    }

    #[test]
    fn chat_request_prompt_optional() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.prompt.is_none());
    }
}
