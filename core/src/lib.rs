//! Configuration-driven HTTP request builder.
//!
//! # Overview
//! Turns a URL template, a method and a `RequestConfig` (headers, query,
//! path params, body and encoding, or a file upload) into a fully resolved
//! `HttpRequest`, sends it through a caller-supplied `Transport`, and returns
//! the response body as text.
//!
//! # Design
//! - `Fetch` holds only its transport; no global client, no shared state.
//! - `build` is pure apart from reading upload sources, so the pipeline can
//!   be tested without a network.
//! - Bodies are a tagged `Body` value; `encode_body` matches the variant
//!   against the declared `EncodingKind`.
//! - `UreqTransport` is the default transport. Anything implementing
//!   `Transport` can replace it.

pub mod body;
pub mod client;
pub mod error;
pub mod http;
pub mod multipart;
pub mod transport;
pub mod types;
pub mod uri;

pub use body::{encode_body, encode_missing_body, EncodedBody};
pub use client::Fetch;
pub use error::{ErrorKind, FetchError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use multipart::{build_multipart, MultipartBody};
pub use transport::{Transport, TransportResponse, UreqTransport};
pub use types::{
    Body, EncodingKind, OneShotReader, RequestConfig, RequestConfigBuilder, StreamOpener,
    UploadDescriptor, UploadSource,
};
pub use uri::{merge_query, substitute_params};
