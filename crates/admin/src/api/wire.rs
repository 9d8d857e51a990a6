//! JSON shapes exchanged with the CMS backend.

use serde::Deserialize;
use serde_json::Value;

use folio_core::TokenPair;

/// Standard `{ success, data, pagination? }` response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: T,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Page metadata on list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(alias = "totalPages")]
    pub total_pages: u32,
    #[serde(alias = "hasNext")]
    pub has_next: bool,
    #[serde(alias = "hasPrev")]
    pub has_prev: bool,
}

/// Token fields, accepted in either snake or camel case.
#[derive(Debug, Deserialize)]
pub struct TokenData {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl From<TokenData> for TokenPair {
    fn from(data: TokenData) -> Self {
        Self::new(data.access_token, data.refresh_token)
    }
}

/// Login answers with an envelope, refresh answers flat. Accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenPayload {
    Enveloped { data: TokenData },
    Flat(TokenData),
}

impl From<TokenPayload> for TokenPair {
    fn from(payload: TokenPayload) -> Self {
        match payload {
            TokenPayload::Enveloped { data } | TokenPayload::Flat(data) => data.into(),
        }
    }
}

/// Presigned object-storage upload, from `POST /v1/admin/upload-url`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PresignedUpload {
    /// Target of the direct `PUT`; carries its own signature.
    pub upload_url: String,
    /// Public URL of the object once uploaded.
    pub file_url: String,
    pub key: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body, `{ "message": ..., "error": ... }`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best message from a raw body, if it is a JSON error body.
    pub fn message_from(text: &str) -> Option<String> {
        let body: Self = serde_json::from_str(text).ok()?;
        body.message.or(body.error).filter(|m| !m.trim().is_empty())
    }
}

/// List response: `data` is an array of items.
pub type ListEnvelope = Envelope<Vec<Value>>;
