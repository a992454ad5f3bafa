//! Reply validation, routing stamp and serialization.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::codec::to_xml;
use crate::error::{Result, WebhookError};
use crate::message::{InboundMessage, MsgType};
use crate::reply::types::{ReplyData, Stampable};

/// An application reply: the declared kind and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub msg_type: MsgType,
    pub data: Option<ReplyData>,
}

impl Reply {
    pub fn new(msg_type: MsgType, data: Option<ReplyData>) -> Self {
        Self { msg_type, data }
    }

    pub fn from_data(data: ReplyData) -> Self {
        Self {
            msg_type: data.kind(),
            data: Some(data),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::from_data(ReplyData::Text(crate::reply::TextReply::new(content)))
    }
}

/// A stamped reply and its serialized form.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltReply {
    pub message: ReplyData,
    pub raw: Vec<u8>,
}

/// Kinds that may be sent as a passive reply.
pub fn is_supported_reply_kind(kind: &MsgType) -> bool {
    matches!(
        kind,
        MsgType::Text
            | MsgType::Image
            | MsgType::Voice
            | MsgType::Video
            | MsgType::Music
            | MsgType::News
            | MsgType::TransferCustomerService
    )
}

/// Validate, stamp and serialize a reply to `inbound`.
///
/// `None` means the application chose not to reply; nothing is produced.
pub fn build_response(
    reply: Option<Reply>,
    inbound: &InboundMessage,
    create_time: i64,
) -> Result<Option<BuiltReply>> {
    let Some(reply) = reply else {
        debug!("reply_absent");
        return Ok(None);
    };

    if !is_supported_reply_kind(&reply.msg_type) {
        warn!(msg_type = %reply.msg_type, "reply_kind_unsupported");
        return Err(WebhookError::UnsupportedReplyKind(reply.msg_type));
    }

    let Reply { msg_type, data } = reply;
    let mut data = data.ok_or_else(|| WebhookError::InvalidReplyPayloadShape {
        declared: msg_type.clone(),
        reason: "reply has no payload".into(),
    })?;

    if data.kind() != msg_type {
        return Err(WebhookError::InvalidReplyPayloadShape {
            reason: format!("payload is a {} reply", data.kind()),
            declared: msg_type,
        });
    }

    let to_user_name = inbound.from_user_name();
    let raw = stamp_and_serialize(
        &mut data,
        to_user_name,
        inbound.to_user_name(),
        msg_type.clone(),
        create_time,
    )?;

    debug!(
        msg_type = %msg_type,
        to_user_name = %to_user_name,
        length = raw.len(),
        "reply_built"
    );

    Ok(Some(BuiltReply { message: data, raw }))
}

/// Set the routing fields and serialize to XML.
///
/// A panic in either step is caught and reported as `Serialization`.
fn stamp_and_serialize<T: Stampable + Serialize>(
    payload: &mut T,
    to_user_name: &str,
    from_user_name: &str,
    msg_type: MsgType,
    create_time: i64,
) -> Result<Vec<u8>> {
    let kind = msg_type.clone();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        payload.set_routing(to_user_name, from_user_name, msg_type, create_time);
        to_xml(&*payload)
    }));

    match outcome {
        Ok(encoded) => encoded,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(msg_type = %kind, detail = %detail, "reply_build_panicked");
            Err(WebhookError::Serialization(format!("panic while building reply: {detail}")))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageBody, MessageHeader, TextMessage};
    use crate::reply::{ImageReply, TextReply};

    fn inbound() -> InboundMessage {
        InboundMessage {
            header: MessageHeader {
                to_user_name: "gh_x".into(),
                from_user_name: "userA".into(),
                create_time: 1,
                msg_type: MsgType::Text,
                event: None,
            },
            body: MessageBody::Text(TextMessage {
                content: "hello".into(),
                msg_id: Some(1),
            }),
        }
    }

    #[test]
    fn test_no_reply_produces_nothing() {
        let built = build_response(None, &inbound(), 100).unwrap();
        assert!(built.is_none());
    }

    #[test]
    fn test_unsupported_kind_rejected() {
        let reply = Reply::new(
            MsgType::Location,
            Some(ReplyData::Text(TextReply::new("x"))),
        );
        let err = build_response(Some(reply), &inbound(), 100).unwrap_err();
        assert!(matches!(err, WebhookError::UnsupportedReplyKind(MsgType::Location)));
    }

    #[test]
    fn test_missing_payload_rejected() {
        let reply = Reply::new(MsgType::Text, None);
        let err = build_response(Some(reply), &inbound(), 100).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidReplyPayloadShape { .. }));
    }

    #[test]
    fn test_mismatched_payload_rejected() {
        let reply = Reply::new(
            MsgType::Text,
            Some(ReplyData::Image(ImageReply::new("media"))),
        );
        let err = build_response(Some(reply), &inbound(), 100).unwrap_err();
        match err {
            WebhookError::InvalidReplyPayloadShape { declared, reason } => {
                assert_eq!(declared, MsgType::Text);
                assert!(reason.contains("image"));
            }
            other => panic!("Expected InvalidReplyPayloadShape, got {other:?}"),
        }
    }

    #[test]
    fn test_text_reply_stamped_and_serialized() {
        let built = build_response(
            Some(Reply::text("hi there")),
            &inbound(),
            1700000000,
        )
        .unwrap()
        .unwrap();

        let xml = String::from_utf8(built.raw).unwrap();
        assert!(xml.contains("<ToUserName>userA</ToUserName>"));
        assert!(xml.contains("<FromUserName>gh_x</FromUserName>"));
        assert!(xml.contains("<CreateTime>1700000000</CreateTime>"));
        assert!(xml.contains("<MsgType>text</MsgType>"));
        assert!(xml.contains("<Content>hi there</Content>"));
    }

    #[test]
    fn test_reply_serialized_as_xml() {
        let built = build_response(Some(Reply::text("hi")), &inbound(), 7)
            .unwrap()
            .unwrap();
        let xml = String::from_utf8(built.raw).unwrap();
        assert!(xml.starts_with("<xml>"));
        assert!(xml.contains("<CreateTime>7</CreateTime>"));
    }

    struct ExplodingReply;

    impl Stampable for ExplodingReply {
        fn set_routing(&mut self, _: &str, _: &str, _: MsgType, _: i64) {
            panic!("routing exploded");
        }
    }

    impl Serialize for ExplodingReply {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            serializer.serialize_unit()
        }
    }

    struct UnencodableReply;

    impl Stampable for UnencodableReply {
        fn set_routing(&mut self, _: &str, _: &str, _: MsgType, _: i64) {}
    }

    impl Serialize for UnencodableReply {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    #[test]
    fn test_panic_while_stamping_becomes_serialization_error() {
        let err = stamp_and_serialize(&mut ExplodingReply, "userA", "gh_x", MsgType::Text, 1)
            .unwrap_err();
        match err {
            WebhookError::Serialization(detail) => assert!(detail.contains("routing exploded")),
            other => panic!("Expected Serialization, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_failure_becomes_serialization_error() {
        let err = stamp_and_serialize(&mut UnencodableReply, "userA", "gh_x", MsgType::Text, 1)
            .unwrap_err();
        assert!(matches!(err, WebhookError::Serialization(_)));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
