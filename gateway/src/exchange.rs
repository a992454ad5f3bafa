//! One callback request and its reply.
//!
//! ## Lifecycle
//!
//! ```text
//! validate → decode envelope → (decrypt) → parse → application reply
//!          → stamp + serialize → (encrypt) → response bytes
//! ```
//!
//! Plain or safe mode is decided once from `encrypt_type` and never changes
//! for the request. In safe mode the random seed, timestamp and nonce of the
//! inbound envelope are kept so the reply envelope mirrors them.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::codec::{to_xml, WireFormat};
use crate::crypto::{random_nonce, validate_query_signature, MessageCrypt, RandomSeed};
use crate::envelope::{decode_body, is_safe_mode, InboundPayload, ResponseEnvelope};
use crate::error::{Result, SignatureScope, WebhookError};
use crate::message::{parse_message, InboundMessage};
use crate::reply::{build_response, BuiltReply, Reply};

const FALLBACK_NONCE_LEN: usize = 16;

/// Query parameters of a callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub encrypt_type: Option<String>,
    pub openid: Option<String>,
    pub msg_signature: Option<String>,
    /// Present only on the URL verification GET
    pub echostr: Option<String>,
}

impl CallbackQuery {
    fn param(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or("")
    }

    pub fn timestamp(&self) -> &str {
        Self::param(&self.timestamp)
    }

    pub fn nonce(&self) -> &str {
        Self::param(&self.nonce)
    }

    pub fn signature(&self) -> &str {
        Self::param(&self.signature)
    }

    pub fn msg_signature(&self) -> &str {
        Self::param(&self.msg_signature)
    }
}

/// Everything read from the HTTP request.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub query: CallbackQuery,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InboundOptions {
    /// Skip the query signature check for trusted callers
    pub skip_validation: bool,
}

/// Encryption mode of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Plain,
    Safe {
        seed: RandomSeed,
        timestamp: i64,
        nonce: String,
    },
}

/// Validate the URL signature of a request.
pub fn validate(crypt: &MessageCrypt, query: &CallbackQuery, options: &InboundOptions) -> Result<()> {
    if validate_query_signature(
        crypt.token(),
        query.timestamp(),
        query.nonce(),
        query.signature(),
        options.skip_validation,
    ) {
        Ok(())
    } else {
        Err(WebhookError::Authentication {
            scope: SignatureScope::Query,
        })
    }
}

/// State of one callback from parse to response.
#[derive(Debug)]
pub struct Exchange {
    crypt: Arc<MessageCrypt>,
    format: WireFormat,
    mode: Mode,
    open_id: Option<String>,
    raw_message: Vec<u8>,
    message: InboundMessage,
    response: Option<BuiltReply>,
}

impl Exchange {
    /// Authenticate, unwrap and parse an inbound callback.
    pub fn handle_inbound(
        crypt: Arc<MessageCrypt>,
        request: InboundRequest,
        options: &InboundOptions,
    ) -> Result<Self> {
        let InboundRequest {
            query,
            content_type,
            body,
        } = request;

        validate(&crypt, &query, options)?;

        let format = WireFormat::from_content_type(content_type.as_deref());
        let safe_mode = is_safe_mode(query.encrypt_type.as_deref());

        let (mode, raw_message) = match decode_body(body, format, safe_mode)? {
            InboundPayload::Plain(raw) => (Mode::Plain, raw),
            InboundPayload::Encrypted(envelope) => {
                let timestamp_str = query.timestamp();
                let timestamp: i64 = timestamp_str.trim().parse().map_err(|_| {
                    warn!(timestamp = %timestamp_str, "inbound_timestamp_invalid");
                    WebhookError::InvalidTimestamp {
                        value: timestamp_str.to_string(),
                    }
                })?;
                let nonce = query.nonce().to_string();

                let (seed, raw) = crypt.open(
                    timestamp_str,
                    &nonce,
                    &envelope.encrypted_msg,
                    query.msg_signature(),
                )?;
                debug!(plaintext_length = raw.len(), "inbound_decrypted");

                (
                    Mode::Safe {
                        seed,
                        timestamp,
                        nonce,
                    },
                    raw,
                )
            }
        };

        let message = parse_message(&raw_message, format)?;

        info!(
            msg_type = %message.msg_type(),
            from_user_name = %message.from_user_name(),
            safe_mode,
            format = %format,
            "inbound_message_parsed"
        );

        Ok(Self {
            crypt,
            format,
            mode,
            open_id: query.openid,
            raw_message,
            message,
            response: None,
        })
    }

    pub fn message(&self) -> &InboundMessage {
        &self.message
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn is_safe_mode(&self) -> bool {
        matches!(self.mode, Mode::Safe { .. })
    }

    pub fn open_id(&self) -> Option<&str> {
        self.open_id.as_deref()
    }

    /// The decrypted (or plaintext) message bytes.
    pub fn raw_message(&self) -> &[u8] {
        &self.raw_message
    }

    pub fn response(&self) -> Option<&BuiltReply> {
        self.response.as_ref()
    }

    /// Stamp and serialize the application's reply.
    ///
    /// On error the previous response (if any) is left untouched.
    pub fn build_response(&mut self, reply: Option<Reply>, clock: &dyn Clock) -> Result<()> {
        let built = build_response(reply, &self.message, clock.now_epoch_secs())?;
        self.response = built;
        Ok(())
    }

    /// The XML response body: the serialized reply, sealed in safe mode.
    ///
    /// `None` when there is nothing to send. JSON requests are answered in
    /// XML too.
    pub fn render(&self) -> Result<Option<Vec<u8>>> {
        let Some(built) = &self.response else {
            return Ok(None);
        };

        match &self.mode {
            Mode::Plain => Ok(Some(built.raw.clone())),
            Mode::Safe {
                seed,
                timestamp,
                nonce,
            } => {
                let nonce = if nonce.is_empty() {
                    random_nonce(FALLBACK_NONCE_LEN)
                } else {
                    nonce.clone()
                };
                let (encrypted_msg, msg_signature) =
                    self.crypt
                        .seal(seed, &built.raw, &timestamp.to_string(), &nonce)?;

                let envelope = ResponseEnvelope {
                    encrypted_msg,
                    msg_signature,
                    timestamp: *timestamp,
                    nonce,
                };
                debug!(timestamp = *timestamp, "reply_sealed");
                to_xml(&envelope).map(Some)
            }
        }
    }

    /// Build the reply and return the bytes to write.
    pub fn handle_reply(&mut self, reply: Option<Reply>, clock: &dyn Clock) -> Result<Option<Vec<u8>>> {
        self.build_response(reply, clock)?;
        self.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::crypto::{decrypt_message, sign, AesKey};
    use crate::message::MsgType;

    const TOKEN: &str = "token";
    const APP_ID: &str = "wx_app";
    const AES_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

    const TEXT_XML: &str = "<xml><ToUserName><![CDATA[gh_x]]></ToUserName>\
        <FromUserName><![CDATA[userA]]></FromUserName><CreateTime>1348831860</CreateTime>\
        <MsgType><![CDATA[text]]></MsgType><Content><![CDATA[hello]]></Content>\
        <MsgId>1</MsgId></xml>";

    fn crypt() -> Arc<MessageCrypt> {
        Arc::new(MessageCrypt::new(TOKEN, APP_ID, Some(AES_KEY)).unwrap())
    }

    fn signed_query(timestamp: &str, nonce: &str) -> CallbackQuery {
        CallbackQuery {
            timestamp: Some(timestamp.into()),
            nonce: Some(nonce.into()),
            signature: Some(sign(&[TOKEN, timestamp, nonce])),
            openid: Some("userA".into()),
            ..CallbackQuery::default()
        }
    }

    #[test]
    fn test_rejects_bad_query_signature() {
        let mut query = signed_query("1700000000", "n");
        query.signature = Some("bad".into());
        let request = InboundRequest {
            query,
            content_type: None,
            body: TEXT_XML.as_bytes().to_vec(),
        };

        let err = Exchange::handle_inbound(crypt(), request, &InboundOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            WebhookError::Authentication {
                scope: SignatureScope::Query
            }
        ));
    }

    #[test]
    fn test_skip_validation() {
        let request = InboundRequest {
            query: CallbackQuery::default(),
            content_type: Some("text/xml".into()),
            body: TEXT_XML.as_bytes().to_vec(),
        };
        let options = InboundOptions {
            skip_validation: true,
        };

        let exchange = Exchange::handle_inbound(crypt(), request, &options).unwrap();
        assert_eq!(exchange.message().text(), Some("hello"));
        assert!(!exchange.is_safe_mode());
    }

    #[test]
    fn test_plain_roundtrip() {
        let request = InboundRequest {
            query: signed_query("1700000000", "n"),
            content_type: Some("text/xml".into()),
            body: TEXT_XML.as_bytes().to_vec(),
        };
        let mut exchange =
            Exchange::handle_inbound(crypt(), request, &InboundOptions::default()).unwrap();
        assert_eq!(exchange.open_id(), Some("userA"));
        assert_eq!(exchange.raw_message(), TEXT_XML.as_bytes());

        let body = exchange
            .handle_reply(Some(Reply::text("pong")), &FixedClock(1700000001))
            .unwrap()
            .unwrap();
        let xml = String::from_utf8(body).unwrap();
        assert!(xml.contains("<ToUserName>userA</ToUserName>"));
        assert!(xml.contains("<FromUserName>gh_x</FromUserName>"));
        assert!(xml.contains("<CreateTime>1700000001</CreateTime>"));
        assert!(xml.contains("<Content>pong</Content>"));
    }

    #[test]
    fn test_no_reply_renders_nothing() {
        let request = InboundRequest {
            query: signed_query("1700000000", "n"),
            content_type: None,
            body: TEXT_XML.as_bytes().to_vec(),
        };
        let mut exchange =
            Exchange::handle_inbound(crypt(), request, &InboundOptions::default()).unwrap();
        assert_eq!(exchange.handle_reply(None, &FixedClock(1)).unwrap(), None);
    }

    #[test]
    fn test_failed_build_keeps_response_empty() {
        let request = InboundRequest {
            query: signed_query("1700000000", "n"),
            content_type: None,
            body: TEXT_XML.as_bytes().to_vec(),
        };
        let mut exchange =
            Exchange::handle_inbound(crypt(), request, &InboundOptions::default()).unwrap();

        let err = exchange
            .build_response(Some(Reply::new(MsgType::Event, None)), &FixedClock(1))
            .unwrap_err();
        assert!(matches!(err, WebhookError::UnsupportedReplyKind(MsgType::Event)));
        assert!(exchange.response().is_none());
    }

    #[test]
    fn test_safe_mode_reuses_seed_timestamp_and_nonce() {
        let crypt = crypt();
        let key = AesKey::from_encoding_key(AES_KEY).unwrap();
        let seed = RandomSeed::new(*b"fedcba9876543210");
        let timestamp = "1700000000";
        let nonce = "nonce42";

        let (ciphertext, msg_signature) = crypt
            .seal(&seed, TEXT_XML.as_bytes(), timestamp, nonce)
            .unwrap();
        let body = format!("<xml><ToUserName>gh_x</ToUserName><Encrypt>{ciphertext}</Encrypt></xml>");

        let mut query = signed_query(timestamp, nonce);
        query.encrypt_type = Some("aes".into());
        query.msg_signature = Some(msg_signature);

        let request = InboundRequest {
            query,
            content_type: Some("text/xml".into()),
            body: body.into_bytes(),
        };
        let mut exchange =
            Exchange::handle_inbound(crypt.clone(), request, &InboundOptions::default()).unwrap();
        assert!(exchange.is_safe_mode());
        assert_eq!(exchange.message().text(), Some("hello"));

        let out = exchange
            .handle_reply(Some(Reply::text("pong")), &FixedClock(1700000005))
            .unwrap()
            .unwrap();
        let envelope: ResponseEnvelope = WireFormat::Xml.decode(&out).unwrap();

        assert_eq!(envelope.timestamp, 1700000000);
        assert_eq!(envelope.nonce, nonce);
        assert_eq!(
            envelope.msg_signature,
            sign(&[TOKEN, timestamp, nonce, &envelope.encrypted_msg])
        );

        let (reply_seed, plain) = decrypt_message(&key, APP_ID, &envelope.encrypted_msg).unwrap();
        assert_eq!(reply_seed, seed);
        let plain = String::from_utf8(plain).unwrap();
        assert!(plain.contains("<Content>pong</Content>"));
    }

    #[test]
    fn test_json_safe_mode_reply_envelope_is_xml() {
        let crypt = crypt();
        let seed = RandomSeed::new(*b"fedcba9876543210");
        let json = r#"{"ToUserName":"gh_x","FromUserName":"userA","CreateTime":1,"MsgType":"text","Content":"hello"}"#;
        let (ciphertext, msg_signature) = crypt
            .seal(&seed, json.as_bytes(), "1700000000", "n")
            .unwrap();

        let mut query = signed_query("1700000000", "n");
        query.encrypt_type = Some("aes".into());
        query.msg_signature = Some(msg_signature);

        let request = InboundRequest {
            query,
            content_type: Some("application/json".into()),
            body: format!(r#"{{"Encrypt":"{ciphertext}"}}"#).into_bytes(),
        };
        let mut exchange =
            Exchange::handle_inbound(crypt, request, &InboundOptions::default()).unwrap();
        assert_eq!(exchange.format(), WireFormat::Json);

        let out = exchange
            .handle_reply(Some(Reply::text("pong")), &FixedClock(5))
            .unwrap()
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("<xml><Encrypt>"));

        let key = AesKey::from_encoding_key(AES_KEY).unwrap();
        let envelope: ResponseEnvelope = WireFormat::Xml.decode(out.as_bytes()).unwrap();
        let (_, plain) = decrypt_message(&key, APP_ID, &envelope.encrypted_msg).unwrap();
        assert!(String::from_utf8(plain).unwrap().starts_with("<xml><ToUserName>userA</ToUserName>"));
    }

    #[test]
    fn test_safe_mode_rejects_bad_message_signature() {
        let crypt = crypt();
        let (ciphertext, _) = crypt
            .seal(&RandomSeed::generate(), TEXT_XML.as_bytes(), "1700000000", "n")
            .unwrap();

        let mut query = signed_query("1700000000", "n");
        query.encrypt_type = Some("aes".into());
        query.msg_signature = Some("0000".into());

        let request = InboundRequest {
            query,
            content_type: Some("application/json".into()),
            body: format!(r#"{{"Encrypt":"{ciphertext}"}}"#).into_bytes(),
        };
        let err = Exchange::handle_inbound(crypt, request, &InboundOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            WebhookError::Authentication {
                scope: SignatureScope::Message
            }
        ));
    }

    #[test]
    fn test_safe_mode_requires_numeric_timestamp() {
        let mut query = signed_query("not-a-number", "n");
        query.encrypt_type = Some("aes".into());

        let request = InboundRequest {
            query,
            content_type: None,
            body: b"<xml><Encrypt>abc</Encrypt></xml>".to_vec(),
        };
        let err = Exchange::handle_inbound(crypt(), request, &InboundOptions::default()).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidTimestamp { .. }));
    }
}
