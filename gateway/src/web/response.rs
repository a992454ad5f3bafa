//! Writing reply bodies into HTTP responses.

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use serde::Serialize;

use crate::codec::{to_xml, PLAIN_CONTENT_TYPE, XML_CONTENT_TYPE};
use crate::error::{Result, WebhookError};

/// Set `Content-Type` unless the caller already chose one.
pub fn write_content_type(headers: &mut HeaderMap, value: &'static str) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
    }
}

/// Builds a 200 response around headers the caller may have pre-populated.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    headers: HeaderMap,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Write `body` with status 200.
    pub fn render(mut self, content_type: &'static str, body: Vec<u8>) -> Result<Response> {
        write_content_type(&mut self.headers, content_type);
        self.finish(Body::from(body))
    }

    /// Write a serialized reply or response envelope.
    pub fn reply(self, body: Vec<u8>) -> Result<Response> {
        self.render(XML_CONTENT_TYPE, body)
    }

    /// Empty 200: the platform reads it as "no reply".
    pub fn empty(self) -> Result<Response> {
        self.finish(Body::empty())
    }

    /// Serialize any value as XML and write it.
    pub fn result_xml<T: Serialize>(self, value: &T) -> Result<Response> {
        let body = to_xml(value)?;
        self.reply(body)
    }

    pub fn result_string(self, text: impl Into<String>) -> Result<Response> {
        self.render(PLAIN_CONTENT_TYPE, text.into().into_bytes())
    }

    fn finish(self, body: Body) -> Result<Response> {
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .body(body)
            .map_err(|e| WebhookError::Write(e.to_string()))?;
        *response.headers_mut() = self.headers;
        Ok(response)
    }
}
