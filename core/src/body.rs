//! Body encoding by declared encoding kind.

use ::url::form_urlencoded;

use crate::error::FetchError;
use crate::types::{Body, EncodingKind};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// An encoded payload and the content type that describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Encode `body` according to `kind`.
///
/// - JSON accepts `Json`, `Form` (as an object) and `Text` (as a JSON string).
/// - URL-ENCODED accepts only `Form`.
/// - OCTET-STREAM accepts `Bytes` and `Text`, passed through unmodified.
///
/// MULTIPART is built from an upload descriptor, never from a body.
pub fn encode_body(kind: EncodingKind, body: &Body) -> Result<EncodedBody, FetchError> {
    match kind {
        EncodingKind::Json => {
            let bytes = match body {
                Body::Json(value) => serde_json::to_vec(value),
                Body::Form(map) => serde_json::to_vec(map),
                Body::Text(text) => serde_json::to_vec(text),
                Body::Bytes(_) => return Err(mismatch(kind, body)),
            }
            .map_err(|e| FetchError::SerializationError(e.to_string()))?;
            Ok(EncodedBody {
                bytes,
                content_type: CONTENT_TYPE_JSON.to_string(),
            })
        }
        EncodingKind::UrlEncoded => {
            let Body::Form(map) = body else {
                return Err(mismatch(kind, body));
            };
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(map)
                .finish();
            Ok(EncodedBody {
                bytes: encoded.into_bytes(),
                content_type: CONTENT_TYPE_FORM.to_string(),
            })
        }
        EncodingKind::OctetStream => {
            let bytes = match body {
                Body::Bytes(bytes) => bytes.clone(),
                Body::Text(text) => text.clone().into_bytes(),
                _ => return Err(mismatch(kind, body)),
            };
            Ok(EncodedBody {
                bytes,
                content_type: CONTENT_TYPE_OCTET_STREAM.to_string(),
            })
        }
        EncodingKind::Multipart => Err(FetchError::TypeMismatch(
            "multipart encoding requires an upload descriptor".to_string(),
        )),
    }
}

/// Encode the absence of a body for a body-carrying method.
///
/// - JSON sends `null`.
/// - URL-ENCODED fails: nothing is a flat mapping.
/// - OCTET-STREAM sends an empty payload.
/// - MULTIPART fails: it needs an upload descriptor.
pub fn encode_missing_body(kind: EncodingKind) -> Result<EncodedBody, FetchError> {
    match kind {
        EncodingKind::Json => encode_body(kind, &Body::Json(serde_json::Value::Null)),
        EncodingKind::UrlEncoded => Err(FetchError::TypeMismatch(
            "urlencode body must be a form mapping, got none".to_string(),
        )),
        EncodingKind::OctetStream => encode_body(kind, &Body::Bytes(Vec::new())),
        EncodingKind::Multipart => encode_body(kind, &Body::Bytes(Vec::new())),
    }
}

fn mismatch(kind: EncodingKind, body: &Body) -> FetchError {
    FetchError::TypeMismatch(format!("{} body cannot be a {body}", kind.as_str()))
}
