//! Request builder and dispatcher.
//!
//! # Design
//! `Fetch` holds only the transport it was given and carries no mutable
//! state between calls. Every operation is split into `build`, which turns a
//! method, URL template and `RequestConfig` into an `HttpRequest` without
//! touching the network, and `execute`, which hands that request to the
//! transport and reads the response body to completion. The convenience
//! entry points (`get`, `post`, ...) run both and return the body text.

use std::io::Read;

use tracing::{debug, warn};

use crate::body::{encode_body, encode_missing_body};
use crate::error::FetchError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::multipart::build_multipart;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Body, RequestConfig};
use crate::uri::{merge_query, substitute_params};

const CONTENT_TYPE: &str = "Content-Type";

/// Blocking HTTP client that builds requests from a `RequestConfig`.
#[derive(Debug, Clone)]
pub struct Fetch<T = UreqTransport> {
    transport: T,
}

impl Default for Fetch<UreqTransport> {
    fn default() -> Self {
        Self::new(UreqTransport::new())
    }
}

impl<T: Transport> Fetch<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the request descriptor for `method` against `url`.
    ///
    /// Body-carrying methods use the multipart builder when an upload is
    /// configured and the body encoder otherwise; a missing body is encoded
    /// too, so JSON sends `null` and URL-ENCODED fails. GET and DELETE never
    /// run the encoder; a raw `Bytes` or `Text` body is still attached to
    /// them verbatim, without a content type.
    pub fn build(
        &self,
        method: HttpMethod,
        url: &str,
        config: &RequestConfig,
    ) -> Result<HttpRequest, FetchError> {
        let url = substitute_params(url, &config.params);
        let url = merge_query(&url, &config.query)?;

        let (body, content_type) = if method.carries_body() {
            if let Some(upload) = &config.upload {
                let multipart = build_multipart(upload)?;
                (Some(multipart.bytes), Some(multipart.content_type))
            } else {
                let kind = config.encoding_or_default();
                let encoded = match &config.body {
                    Some(body) => encode_body(kind, body)?,
                    None => encode_missing_body(kind)?,
                };
                (Some(encoded.bytes), Some(encoded.content_type))
            }
        } else {
            match &config.body {
                Some(Body::Bytes(bytes)) => (Some(bytes.clone()), None),
                Some(Body::Text(text)) => (Some(text.clone().into_bytes()), None),
                _ => (None, None),
            }
        };

        let mut headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if let Some(content_type) = content_type {
            headers.push((CONTENT_TYPE.to_string(), content_type));
        }

        debug!(
            %method,
            %url,
            body_len = body.as_ref().map_or(0, Vec::len),
            "built request"
        );

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: config.timeout,
        })
    }

    /// Send `request` and read the whole response body as text.
    ///
    /// The body stream is dropped on every path, including read failures.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let method = request.method.clone();
        let url = request.url.clone();
        let mut response = self.transport.send(request)?;

        let mut bytes = Vec::new();
        let read = response.body.read_to_end(&mut bytes);
        drop(response.body);
        if let Err(e) = read {
            warn!(%method, %url, error = %e, "failed to read response body");
            return Err(FetchError::ReadError(e.to_string()));
        }

        debug!(%method, %url, status = response.status, "received response");
        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub fn request(
        &self,
        method: HttpMethod,
        url: &str,
        config: &RequestConfig,
    ) -> Result<String, FetchError> {
        let request = self.build(method, url, config)?;
        Ok(self.execute(request)?.body)
    }

    pub fn get(&self, url: &str, config: &RequestConfig) -> Result<String, FetchError> {
        self.request(HttpMethod::Get, url, config)
    }

    pub fn post(&self, url: &str, config: &RequestConfig) -> Result<String, FetchError> {
        self.request(HttpMethod::Post, url, config)
    }

    pub fn put(&self, url: &str, config: &RequestConfig) -> Result<String, FetchError> {
        self.request(HttpMethod::Put, url, config)
    }

    pub fn patch(&self, url: &str, config: &RequestConfig) -> Result<String, FetchError> {
        self.request(HttpMethod::Patch, url, config)
    }

    pub fn delete(&self, url: &str, config: &RequestConfig) -> Result<String, FetchError> {
        self.request(HttpMethod::Delete, url, config)
    }

    /// POST a multipart body built from `config.upload`.
    pub fn upload(&self, url: &str, config: &RequestConfig) -> Result<String, FetchError> {
        if config.upload.is_none() {
            return Err(FetchError::SourceUnavailable(
                "no upload source configured".to_string(),
            ));
        }
        self.request(HttpMethod::Post, url, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use crate::types::{EncodingKind, UploadDescriptor, UploadSource};
    use std::cell::RefCell;
    use std::time::Duration;

    /// Records every request and answers with a fixed body.
    #[derive(Default)]
    struct FakeTransport {
        sent: RefCell<Vec<HttpRequest>>,
        fail_read: bool,
    }

    struct BrokenBody;

    impl Read for BrokenBody {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
            self.sent.borrow_mut().push(request);
            let body: Box<dyn Read> = if self.fail_read {
                Box::new(BrokenBody)
            } else {
                Box::new(&b"{\"ok\":true}"[..])
            };
            Ok(TransportResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body,
            })
        }
    }

    struct Unreachable;

    impl Transport for Unreachable {
        fn send(&self, _: HttpRequest) -> Result<TransportResponse, FetchError> {
            Err(FetchError::TransportError("connection refused".to_string()))
        }
    }

    fn client() -> Fetch<FakeTransport> {
        Fetch::new(FakeTransport::default())
    }

    #[test]
    fn get_resolves_params_and_query() {
        let config = RequestConfig::builder()
            .header("X-Custom-Header", "aric")
            .param("id", "42")
            .query("query2", "value2")
            .query("query1", "value1")
            .build()
            .unwrap();
        let req = client()
            .build(HttpMethod::Get, "https://x/items/{id}", &config)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://x/items/42?query1=value1&query2=value2");
        assert_eq!(
            req.headers,
            vec![("X-Custom-Header".to_string(), "aric".to_string())]
        );
        assert!(req.body.is_none());
    }

    #[test]
    fn get_ignores_structured_body() {
        let config = RequestConfig::builder()
            .encoding(EncodingKind::Json)
            .body(Body::form([("a", "b")]))
            .build()
            .unwrap();
        let req = client().build(HttpMethod::Get, "https://x/", &config).unwrap();
        assert!(req.body.is_none());
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn delete_passes_raw_body_through_without_encoding() {
        let config = RequestConfig::builder()
            .encoding(EncodingKind::UrlEncoded)
            .body(Body::Text("raw payload".to_string()))
            .build()
            .unwrap();
        let req = client().build(HttpMethod::Delete, "https://x/", &config).unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"raw payload"[..]));
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn post_json_sets_content_type_last() {
        let config = RequestConfig::builder()
            .header("Content-Type", "text/plain")
            .data_type("json")
            .body(Body::form([("name", "aric"), ("age", "25")]))
            .build()
            .unwrap();
        let req = client().build(HttpMethod::Post, "https://x/post", &config).unwrap();
        assert_eq!(req.headers.len(), 2);
        assert_eq!(
            req.headers.last().unwrap(),
            &("Content-Type".to_string(), "application/json".to_string())
        );
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["name"], "aric");
    }

    #[test]
    fn post_defaults_to_urlencoded() {
        let config = RequestConfig::builder()
            .body(Body::form([("b", "2"), ("a", "1 1")]))
            .build()
            .unwrap();
        let req = client().build(HttpMethod::Post, "https://x/post", &config).unwrap();
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.body.as_deref(), Some(&b"a=1+1&b=2"[..]));
    }

    #[test]
    fn post_json_without_body_sends_null() {
        let config = RequestConfig::builder().data_type("json").build().unwrap();
        let req = client().build(HttpMethod::Post, "https://x/post", &config).unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"null"[..]));
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn post_without_body_defaults_to_mismatch() {
        let fetch = client();
        let err = fetch.post("https://x/post", &RequestConfig::default()).unwrap_err();
        assert!(matches!(err, FetchError::TypeMismatch(_)));
        assert!(fetch.transport().sent.borrow().is_empty());
    }

    #[test]
    fn octet_stream_without_body_sends_empty_payload() {
        let config = RequestConfig::builder()
            .encoding(EncodingKind::OctetStream)
            .build()
            .unwrap();
        let req = client().build(HttpMethod::Patch, "https://x/patch", &config).unwrap();
        assert_eq!(req.body.as_deref(), Some(&b""[..]));
        assert_eq!(req.header("content-type"), Some("application/octet-stream"));
    }

    #[test]
    fn head_and_options_encode_like_post() {
        let config = RequestConfig::builder()
            .data_type("json")
            .body(Body::form([("a", "1")]))
            .build()
            .unwrap();
        for method in [HttpMethod::Head, HttpMethod::Options] {
            let req = client().build(method, "https://x/", &config).unwrap();
            assert_eq!(req.body.as_deref(), Some(&br#"{"a":"1"}"#[..]));
            assert_eq!(req.header("content-type"), Some("application/json"));
        }
        let err = client()
            .build(HttpMethod::Head, "https://x/", &RequestConfig::default())
            .unwrap_err();
        assert!(matches!(err, FetchError::TypeMismatch(_)));
    }

    #[test]
    fn put_urlencoded_with_json_body_is_mismatch() {
        let config = RequestConfig::builder()
            .body(Body::Json(serde_json::json!([1, 2, 3])))
            .build()
            .unwrap();
        let err = client().put("https://x/put", &config).unwrap_err();
        assert!(matches!(err, FetchError::TypeMismatch(_)));
    }

    #[test]
    fn multipart_kind_without_upload_is_mismatch() {
        let config = RequestConfig::builder()
            .encoding(EncodingKind::Multipart)
            .build()
            .unwrap();
        let err = client().build(HttpMethod::Post, "https://x/", &config).unwrap_err();
        assert!(matches!(err, FetchError::TypeMismatch(_)));
    }

    #[test]
    fn upload_overrides_declared_encoding() {
        let config = RequestConfig::builder()
            .encoding(EncodingKind::Json)
            .body(Body::Json(serde_json::json!({"ignored": true})))
            .upload(UploadDescriptor::new(
                UploadSource::Buffer(b"hello".to_vec()),
                "pic1",
                "01.jpg",
            ))
            .build()
            .unwrap();
        let req = client().build(HttpMethod::Put, "https://x/put", &config).unwrap();
        let content_type = req.header("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.contains("filename=\"01.jpg\""));
        assert!(!body.contains("ignored"));
    }

    #[test]
    fn upload_with_missing_file_sends_nothing() {
        let fetch = client();
        let config = RequestConfig::builder()
            .upload(UploadDescriptor::new(
                UploadSource::Path("/no/such/file.jpg".into()),
                "pic1",
                "file.jpg",
            ))
            .build()
            .unwrap();
        let err = fetch.upload("https://x/upload", &config).unwrap_err();
        assert!(matches!(err, FetchError::SourceUnavailable(_)));
        assert!(fetch.transport().sent.borrow().is_empty());
    }

    #[test]
    fn upload_requires_descriptor() {
        let err = client()
            .upload("https://x/upload", &RequestConfig::default())
            .unwrap_err();
        assert!(matches!(err, FetchError::SourceUnavailable(_)));
    }

    #[test]
    fn invalid_url_fails_before_sending() {
        let fetch = client();
        let err = fetch
            .get("http://[oops/{id}", &RequestConfig::default())
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(fetch.transport().sent.borrow().is_empty());
    }

    #[test]
    fn request_returns_body_text_and_forwards_timeout() {
        let fetch = client();
        let config = RequestConfig::builder()
            .data_type("json")
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        let text = fetch
            .request("purge".parse().unwrap(), "https://x/cache", &config)
            .unwrap();
        assert_eq!(text, r#"{"ok":true}"#);
        let sent = fetch.transport().sent.borrow();
        assert_eq!(sent[0].method, HttpMethod::Custom("purge".to_string()));
        assert_eq!(sent[0].timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn execute_keeps_status_and_headers() {
        let fetch = client();
        let req = fetch
            .build(HttpMethod::Get, "https://x/", &RequestConfig::default())
            .unwrap();
        let response = fetch.execute(req).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.headers[0].1, "application/json");
    }

    #[test]
    fn transport_errors_propagate_unchanged() {
        let err = Fetch::new(Unreachable)
            .get("https://x/", &RequestConfig::default())
            .unwrap_err();
        assert!(matches!(err, FetchError::TransportError(ref msg) if msg == "connection refused"));
    }

    #[test]
    fn read_failure_is_read_error() {
        let fetch = Fetch::new(FakeTransport {
            fail_read: true,
            ..Default::default()
        });
        let err = fetch.get("https://x/", &RequestConfig::default()).unwrap_err();
        assert!(matches!(err, FetchError::ReadError(_)));
    }
}
