//! Request configuration types.
//!
//! # Design
//! `RequestConfig` is built once through `RequestConfigBuilder`, which lists
//! every recognized option and its default, and is read-only afterwards.
//! Bodies are a tagged `Body` value; the encoder matches on the variant.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::error::FetchError;

/// Declared strategy for turning a `Body` into bytes plus a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingKind {
    Json,
    UrlEncoded,
    OctetStream,
    Multipart,
}

impl EncodingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingKind::Json => "json",
            EncodingKind::UrlEncoded => "urlencode",
            EncodingKind::OctetStream => "octet-stream",
            EncodingKind::Multipart => "multipart",
        }
    }
}

impl FromStr for EncodingKind {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(EncodingKind::Json),
            "urlencode" | "urlencoded" | "form" => Ok(EncodingKind::UrlEncoded),
            "octet-stream" | "binary" | "raw" => Ok(EncodingKind::OctetStream),
            "multipart" => Ok(EncodingKind::Multipart),
            _ => Err(FetchError::UnsupportedEncoding(s.to_string())),
        }
    }
}

/// A request body. Which variants an encoding kind accepts is decided by
/// `encode_body`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Any JSON value.
    Json(serde_json::Value),
    /// Flat string-to-string mapping.
    Form(BTreeMap<String, String>),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A string, treated as raw bytes by byte-oriented encodings.
    Text(String),
}

impl Body {
    /// Serialize any value into a `Body::Json`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Body, FetchError> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| FetchError::SerializationError(e.to_string()))
    }

    pub fn form<K, V, I>(pairs: I) -> Body
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Body::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Body::Json(_) => "json value",
            Body::Form(_) => "form mapping",
            Body::Bytes(_) => "bytes",
            Body::Text(_) => "text",
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.variant_name())
    }
}

/// Opens a fresh byte stream each time it is called.
pub type StreamOpener = Arc<dyn Fn() -> std::io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// A reader that can be taken exactly once.
pub type OneShotReader = Arc<Mutex<Option<Box<dyn Read + Send>>>>;

/// Where the bytes of an uploaded file come from.
///
/// `Path`, `Buffer` and `Stream` can be opened any number of times. `Reader`
/// wraps an already open stream and is consumed by the first `open`; clones
/// share it.
#[derive(Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Buffer(Vec<u8>),
    Stream(StreamOpener),
    Reader(OneShotReader),
}

impl UploadSource {
    pub fn stream<F>(opener: F) -> Self
    where
        F: Fn() -> std::io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        UploadSource::Stream(Arc::new(opener))
    }

    pub fn reader<R: Read + Send + 'static>(reader: R) -> Self {
        let reader: Box<dyn Read + Send> = Box::new(reader);
        UploadSource::Reader(Arc::new(Mutex::new(Some(reader))))
    }

    /// Open the source as a readable stream.
    pub fn open(&self) -> Result<Box<dyn Read + Send>, FetchError> {
        match self {
            UploadSource::Path(path) => std::fs::File::open(path)
                .map(|file| Box::new(file) as Box<dyn Read + Send>)
                .map_err(|e| FetchError::SourceUnavailable(format!("{}: {e}", path.display()))),
            UploadSource::Buffer(bytes) => Ok(Box::new(std::io::Cursor::new(bytes.clone()))),
            UploadSource::Stream(opener) => {
                opener().map_err(|e| FetchError::SourceUnavailable(e.to_string()))
            }
            UploadSource::Reader(slot) => slot
                .lock()
                .map_err(|_| FetchError::SourceUnavailable("reader lock poisoned".to_string()))?
                .take()
                .ok_or_else(|| FetchError::SourceUnavailable("reader already consumed".to_string())),
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            UploadSource::Buffer(bytes) => f
                .debug_struct("Buffer")
                .field("length", &bytes.len())
                .finish(),
            UploadSource::Stream(_) => f.debug_struct("Stream").finish_non_exhaustive(),
            UploadSource::Reader(slot) => f
                .debug_struct("Reader")
                .field("consumed", &slot.lock().map_or(true, |r| r.is_none()))
                .finish(),
        }
    }
}

/// Describes the file part (and extra text parts) of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    pub source: UploadSource,
    /// Form field carrying the file.
    pub field_name: String,
    /// Filename advertised in the file part.
    pub file_name: String,
    pub extra_fields: BTreeMap<String, String>,
}

impl UploadDescriptor {
    pub fn new(source: UploadSource, field_name: &str, file_name: &str) -> Self {
        Self {
            source,
            field_name: field_name.to_string(),
            file_name: file_name.to_string(),
            extra_fields: BTreeMap::new(),
        }
    }

    pub fn extra_field(mut self, key: &str, value: &str) -> Self {
        self.extra_fields.insert(key.to_string(), value.to_string());
        self
    }
}

/// Read-only configuration for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    /// Unset means URL-ENCODED for methods that carry a body.
    pub encoding: Option<EncodingKind>,
    pub body: Option<Body>,
    pub upload: Option<UploadDescriptor>,
    /// Forwarded to the transport unchanged.
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn builder() -> RequestConfigBuilder {
        RequestConfigBuilder::default()
    }

    /// Encoding kind after defaulting.
    pub fn encoding_or_default(&self) -> EncodingKind {
        self.encoding.unwrap_or(EncodingKind::UrlEncoded)
    }
}

/// Builder for [`RequestConfig`].
///
/// | option      | default      |
/// |-------------|--------------|
/// | headers     | empty        |
/// | query       | empty        |
/// | params      | empty        |
/// | data type   | unset        |
/// | body        | unset        |
/// | upload      | unset        |
/// | timeout     | unset        |
#[derive(Debug, Default)]
pub struct RequestConfigBuilder {
    config: RequestConfig,
    data_type: Option<String>,
}

impl RequestConfigBuilder {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.config.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.config.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.config.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn encoding(mut self, kind: EncodingKind) -> Self {
        self.config.encoding = Some(kind);
        self.data_type = None;
        self
    }

    /// Set the encoding kind by name. Unknown names fail in `build`.
    pub fn data_type(mut self, name: &str) -> Self {
        self.data_type = Some(name.to_string());
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.config.body = Some(body);
        self
    }

    pub fn upload(mut self, upload: UploadDescriptor) -> Self {
        self.config.upload = Some(upload);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn build(mut self) -> Result<RequestConfig, FetchError> {
        if let Some(name) = self.data_type.take() {
            self.config.encoding = Some(name.parse()?);
        }
        Ok(self.config)
    }
}
