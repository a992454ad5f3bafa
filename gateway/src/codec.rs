//! Wire-format selection shared by every decode and encode path.
//!
//! The platform posts either XML (official accounts) or JSON (mini programs
//! configured for JSON push). The `Content-Type` header is the only signal,
//! and the same rule applies to envelopes and messages. Replies are always
//! XML.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, WebhookError};

pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
pub const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Serialization format of a callback body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Xml,
    Json,
}

impl WireFormat {
    /// `application/json` anywhere in the header selects JSON; anything else,
    /// including a missing header, selects XML.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.contains("application/json") => WireFormat::Json,
            _ => WireFormat::Xml,
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        let parse_error = |reason: String| WebhookError::BodyParse {
            format: self,
            reason,
        };

        match self {
            WireFormat::Json => serde_json::from_slice(bytes).map_err(|e| parse_error(e.to_string())),
            WireFormat::Xml => {
                let text = std::str::from_utf8(bytes).map_err(|e| parse_error(e.to_string()))?;
                quick_xml::de::from_str(text).map_err(|e| parse_error(e.to_string()))
            }
        }
    }

}

/// Serialize a reply or response envelope; the outbound body is always XML.
pub fn to_xml<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    quick_xml::se::to_string(value)
        .map(String::into_bytes)
        .map_err(|e| WebhookError::Serialization(e.to_string()))
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::Xml => f.write_str("xml"),
            WireFormat::Json => f.write_str("json"),
        }
    }
}
