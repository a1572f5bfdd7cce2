//! The HTTP-like response consumed by the protocol client.
//!
//! Headers select the disposition; the body is a chunked byte stream read
//! lazily (the patch path diffs while reading). Header lookup is
//! case-insensitive; the canonical names live in [`super`].

use futures::stream::{self, LocalBoxStream, StreamExt};
use indexmap::IndexMap;

/// Chunked response body. An `Err` chunk aborts the read.
pub type BodyStream = LocalBoxStream<'static, Result<Vec<u8>, String>>;

pub struct Response {
    headers: IndexMap<String, String>,
    body: Option<BodyStream>,
}

impl Response {
    pub fn new(headers: &[(&str, &str)], body: BodyStream) -> Self {
        Self {
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            body: Some(body),
        }
    }

    /// Response with an in-memory body, delivered as a single chunk.
    pub fn from_text(headers: &[(&str, &str)], body: &str) -> Self {
        let bytes = body.as_bytes().to_vec();
        Self::new(headers, stream::iter(vec![Ok(bytes)]).boxed_local())
    }

    /// Response with a body split into the given chunks.
    pub fn from_chunks(headers: &[(&str, &str)], chunks: Vec<Vec<u8>>) -> Self {
        Self::new(
            headers,
            stream::iter(chunks.into_iter().map(Ok)).boxed_local(),
        )
    }

    /// Headers-only response.
    pub fn empty(headers: &[(&str, &str)]) -> Self {
        Self::new(headers, stream::iter(Vec::new()).boxed_local())
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// Whether the content type names the given subtype.
    pub fn content_type_includes(&self, subtype: &str) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.contains(subtype))
    }

    /// Take the body stream; a second take yields nothing.
    pub fn take_body(&mut self) -> Option<BodyStream> {
        self.body.take()
    }
}

/// Read a body stream to completion.
pub async fn collect_body(mut body: BodyStream) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        out.extend(chunk?);
    }
    Ok(out)
}

// =============================================================================
// Tests
// =============================================================================
