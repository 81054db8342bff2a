//! Path-parameter substitution and query-string merging.

use std::collections::BTreeMap;

use tracing::trace;
use ::url::form_urlencoded;
use ::url::{Position, Url};

use crate::error::FetchError;

/// Scheme used to validate protocol-relative templates; never emitted.
const PLACEHOLDER_SCHEME: &str = "http";

/// Replace every literal `{key}` in `template` with its value.
///
/// Substitution is textual: values are inserted as-is, keys missing from
/// the template are ignored, and placeholders missing from `params` stay
/// verbatim.
pub fn substitute_params(template: &str, params: &BTreeMap<String, String>) -> String {
    params.iter().fold(template.to_string(), |url, (key, value)| {
        url.replace(&format!("{{{key}}}"), value)
    })
}

/// Parse `url`, set every key in `query` (replacing existing values), and
/// re-serialize the query with keys in lexicographic order.
///
/// Keys already present in `url` and not in `query` keep all of their
/// values. An empty resulting query drops the `?` entirely. Relative
/// templates stay relative: a protocol-relative `//host/path` keeps its
/// authority, and any other relative reference keeps its path text
/// (including dot segments) verbatim.
pub fn merge_query(url: &str, query: &BTreeMap<String, String>) -> Result<String, FetchError> {
    match Url::parse(url) {
        Ok(mut parsed) => {
            let encoded = merged_pairs(parsed.query(), query);
            parsed.set_query(encoded.as_deref());
            Ok(parsed.to_string())
        }
        Err(::url::ParseError::RelativeUrlWithoutBase) if url.starts_with("//") => {
            let mut parsed = Url::parse(&format!("{PLACEHOLDER_SCHEME}:{url}"))
                .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
            let encoded = merged_pairs(parsed.query(), query);
            parsed.set_query(encoded.as_deref());
            Ok(format!("//{}", &parsed[Position::BeforeUsername..]))
        }
        Err(::url::ParseError::RelativeUrlWithoutBase) => {
            let (rest, fragment) = match url.split_once('#') {
                Some((rest, fragment)) => (rest, Some(fragment)),
                None => (url, None),
            };
            let (path, existing) = match rest.split_once('?') {
                Some((path, existing)) => (path, Some(existing)),
                None => (rest, None),
            };
            let mut out = path.to_string();
            if let Some(encoded) = merged_pairs(existing, query) {
                out.push('?');
                out.push_str(&encoded);
            }
            if let Some(fragment) = fragment {
                out.push('#');
                out.push_str(fragment);
            }
            Ok(out)
        }
        Err(e) => Err(FetchError::InvalidUrl(format!("{url}: {e}"))),
    }
}

/// Merge `query` over the pairs of `existing` and form-encode the result.
/// `None` when there is nothing to encode.
fn merged_pairs(existing: Option<&str>, query: &BTreeMap<String, String>) -> Option<String> {
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(existing.unwrap_or_default().as_bytes()) {
        merged.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    for (key, value) in query {
        merged.insert(key.clone(), vec![value.clone()]);
    }
    if merged.is_empty() {
        return None;
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, values) in &merged {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    let encoded = serializer.finish();
    trace!(query = %encoded, "merged query");
    Some(encoded)
}
