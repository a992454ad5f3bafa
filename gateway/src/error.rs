//! Error types for the webhook gateway.
//!
//! Every failure along the inbound/outbound path maps to one variant here.
//! Nothing is retried internally; the platform redelivers on its own.

use thiserror::Error;

use crate::codec::WireFormat;
use crate::message::{InboundMessage, MsgType};

/// Which signature check rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScope {
    /// `signature` over token, timestamp and nonce.
    Query,
    /// `msg_signature` over token, timestamp, nonce and ciphertext.
    Message,
}

impl std::fmt::Display for SignatureScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureScope::Query => f.write_str("query"),
            SignatureScope::Message => f.write_str("message"),
        }
    }
}

/// Top-level error type for all gateway operations.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("{scope} signature mismatch")]
    Authentication { scope: SignatureScope },

    #[error("invalid timestamp: {value:?}")]
    InvalidTimestamp { value: String },

    #[error("failed to parse {format} body: {reason}")]
    BodyParse { format: WireFormat, reason: String },

    #[error("malformed subscription list: {reason}")]
    MalformedList {
        reason: String,
        /// The message decoded before the list sub-step failed.
        partial: Box<InboundMessage>,
    },

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("unsupported reply kind: {0}")]
    UnsupportedReplyKind(MsgType),

    #[error("invalid reply payload for {declared}: {reason}")]
    InvalidReplyPayloadShape { declared: MsgType, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("failed to write response: {0}")]
    Write(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WebhookError {
    /// Whether the request was rejected by a signature check.
    pub fn is_authentication(&self) -> bool {
        matches!(self, WebhookError::Authentication { .. })
    }

    /// Whether the error stems from malformed client input rather than a
    /// server-side fault.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            WebhookError::InvalidTimestamp { .. }
                | WebhookError::BodyParse { .. }
                | WebhookError::MalformedList { .. }
                | WebhookError::Decryption(_)
        )
    }

    /// Recover the partially decoded message from a `MalformedList` error.
    pub fn into_partial_message(self) -> Option<InboundMessage> {
        match self {
            WebhookError::MalformedList { partial, .. } => Some(*partial),
            _ => None,
        }
    }
}

/// A convenience Result alias that defaults to [`WebhookError`].
pub type Result<T> = std::result::Result<T, WebhookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_display_names_scope() {
        let err = WebhookError::Authentication {
            scope: SignatureScope::Message,
        };
        assert_eq!(err.to_string(), "message signature mismatch");
        assert!(err.is_authentication());
        assert!(!err.is_bad_request());
    }

    #[test]
    fn test_body_parse_display() {
        let err = WebhookError::BodyParse {
            format: WireFormat::Json,
            reason: "expected value".into(),
        };
        assert_eq!(err.to_string(), "failed to parse json body: expected value");
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_unsupported_reply_display() {
        let err = WebhookError::UnsupportedReplyKind(MsgType::Location);
        assert_eq!(err.to_string(), "unsupported reply kind: location");
    }

    #[test]
    fn test_into_partial_message_only_for_malformed_list() {
        let err = WebhookError::Write("closed".into());
        assert!(err.into_partial_message().is_none());
    }
}
