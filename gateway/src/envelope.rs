//! Outer wire structures of a callback body.
//!
//! In plain mode the body is the message itself. In safe mode
//! (`encrypt_type=aes`) the body wraps a base64 ciphertext, and the reply is
//! wrapped the same way together with its signature.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::WireFormat;
use crate::error::Result;

/// Query value of `encrypt_type` that selects safe mode.
pub const SAFE_MODE_ENCRYPT_TYPE: &str = "aes";

/// Encrypted request body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: Option<String>,
    /// Base64 AES ciphertext
    #[serde(rename = "Encrypt")]
    pub encrypted_msg: String,
}

/// Encrypted reply body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct ResponseEnvelope {
    #[serde(rename = "Encrypt")]
    pub encrypted_msg: String,
    #[serde(rename = "MsgSignature")]
    pub msg_signature: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: i64,
    #[serde(rename = "Nonce")]
    pub nonce: String,
}

/// A request body after envelope decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// The raw body is the message
    Plain(Vec<u8>),
    Encrypted(EncryptedEnvelope),
}

pub fn is_safe_mode(encrypt_type: Option<&str>) -> bool {
    encrypt_type == Some(SAFE_MODE_ENCRYPT_TYPE)
}

/// Decode a request body, consuming it.
pub fn decode_body(body: Vec<u8>, format: WireFormat, safe_mode: bool) -> Result<InboundPayload> {
    if !safe_mode {
        return Ok(InboundPayload::Plain(body));
    }

    let envelope: EncryptedEnvelope = format.decode(&body)?;
    debug!(
        format = %format,
        ciphertext_length = envelope.encrypted_msg.len(),
        to_user_name = ?envelope.to_user_name,
        "envelope_decoded"
    );
    Ok(InboundPayload::Encrypted(envelope))
}
