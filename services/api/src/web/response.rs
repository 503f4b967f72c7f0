//! services/api/src/web/response.rs
//!
//! The JSON envelope every endpoint answers with, and the extractors that turn
//! decoding failures into that envelope instead of axum's plain-text rejections.

use axum::{
    extract::{FromRequest, FromRequestParts, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ApiError;

//=========================================================================================
// Envelope
//=========================================================================================

/// `{success, data?, message?, error?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(kind: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error: Some(kind.to_string()),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 200 with `data`.
pub fn ok<T: Serialize>(data: T) -> Envelope<T> {
    Envelope::data(data)
}

/// 201 with `data` and a confirmation message.
pub fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Envelope<T>) {
    (StatusCode::CREATED, Envelope::data(data).with_message(message))
}

//=========================================================================================
// Extractors
//=========================================================================================

/// `axum::Json` with envelope-shaped rejections.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with envelope-shaped rejections.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `axum::extract::Path` with envelope-shaped rejections.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Decodes a JSON body that may be omitted entirely; an empty body yields `T::default()`.
pub fn optional_body<T>(body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Malformed(format!("Failed to parse the request body as JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Notes {
        notes: Option<String>,
    }

    #[test]
    fn optional_body_accepts_empty_and_rejects_garbage() {
        assert_eq!(optional_body::<Notes>(&Bytes::new()).unwrap(), Notes::default());
        let parsed: Notes = optional_body(&Bytes::from_static(br#"{"notes":"hi"}"#)).unwrap();
        assert_eq!(parsed.notes.as_deref(), Some("hi"));
        assert!(optional_body::<Notes>(&Bytes::from_static(b"{not json")).is_err());
    }

    #[test]
    fn failure_envelope_omits_data() {
        let json = serde_json::to_value(Envelope::<()>::failure("Not Found", "gone")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "gone", "error": "Not Found"})
        );
    }
}
