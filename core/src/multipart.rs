//! `multipart/form-data` body construction for uploads.
//!
//! The file stream is read once into memory, so the resulting body is fully
//! materialized and safe for single-pass consumption by any transport. A new
//! body must be built for every send.

use std::io::Read;

use uuid::Uuid;

use crate::error::FetchError;
use crate::types::UploadDescriptor;

/// An assembled multipart body.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub bytes: Vec<u8>,
    pub boundary: String,
    pub content_type: String,
}

/// Open the upload source and assemble one file part plus one text part per
/// extra field.
pub fn build_multipart(upload: &UploadDescriptor) -> Result<MultipartBody, FetchError> {
    let mut reader = upload.source.open()?;
    let mut file = Vec::new();
    reader
        .read_to_end(&mut file)
        .map_err(|e| FetchError::SourceUnavailable(e.to_string()))?;
    drop(reader);

    let boundary = loop {
        let candidate = Uuid::new_v4().simple().to_string();
        if !occurs_in(&candidate, &file, upload) {
            break candidate;
        }
    };

    let mut bytes = Vec::with_capacity(file.len() + 256);
    bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    bytes.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            escape_quotes(&upload.field_name),
            escape_quotes(&upload.file_name)
        )
        .as_bytes(),
    );
    bytes.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    bytes.extend_from_slice(&file);
    bytes.extend_from_slice(b"\r\n");

    for (name, value) in &upload.extra_fields {
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quotes(name)
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(value.as_bytes());
        bytes.extend_from_slice(b"\r\n");
    }
    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok(MultipartBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        boundary,
        bytes,
    })
}

fn occurs_in(boundary: &str, file: &[u8], upload: &UploadDescriptor) -> bool {
    let needle = boundary.as_bytes();
    let in_bytes = |haystack: &[u8]| haystack.windows(needle.len()).any(|w| w == needle);
    in_bytes(file)
        || in_bytes(upload.field_name.as_bytes())
        || in_bytes(upload.file_name.as_bytes())
        || upload
            .extra_fields
            .iter()
            .any(|(k, v)| in_bytes(k.as_bytes()) || in_bytes(v.as_bytes()))
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
