//! Two-phase parsing of inbound message payloads.
//!
//! ```text
//! raw bytes → MessageHeader (MsgType, Event) → kind-specific payload
//! ```
//!
//! Subscribe-message events carry an irregular `List`: the JSON push sends a
//! bare object for a single template and an array for several. It is
//! extracted in a separate tolerant pass so that a malformed list never
//! hides the rest of the message.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::WireFormat;
use crate::error::{Result, WebhookError};
use crate::message::types::*;

/// Event fields, decoded only for `event` messages.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventFields {
    #[serde(rename = "Event")]
    event: String,
    #[serde(rename = "EventKey")]
    event_key: Option<String>,
    #[serde(rename = "Ticket")]
    ticket: Option<String>,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Precision")]
    precision: f64,
    #[serde(rename = "MenuId", deserialize_with = "lenient_i64")]
    menu_id: Option<i64>,
    #[serde(rename = "ScanCodeInfo")]
    scan_code_info: ScanCodeInfo,
    #[serde(rename = "SendPicsInfo")]
    send_pics_info: SendPicsInfo,
    #[serde(rename = "SendLocationInfo")]
    send_location_info: SendLocationInfo,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "MsgID", deserialize_with = "lenient_i64")]
    msg_id: Option<i64>,
    #[serde(rename = "TotalCount", deserialize_with = "lenient_i64")]
    total_count: Option<i64>,
    #[serde(rename = "FilterCount", deserialize_with = "lenient_i64")]
    filter_count: Option<i64>,
    #[serde(rename = "SentCount", deserialize_with = "lenient_i64")]
    sent_count: Option<i64>,
    #[serde(rename = "ErrorCount", deserialize_with = "lenient_i64")]
    error_count: Option<i64>,
}

impl EventFields {
    fn key(&self) -> String {
        self.event_key.clone().unwrap_or_default()
    }

    fn job(&self) -> JobFinishEvent {
        JobFinishEvent {
            msg_id: self.msg_id,
            status: self.status.clone(),
            total_count: self.total_count,
            filter_count: self.filter_count,
            sent_count: self.sent_count,
            error_count: self.error_count,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlSubscriptionList {
    #[serde(rename = "List")]
    list: Vec<SubscriptionItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlSubscriptionLists {
    #[serde(rename = "SubscribeMsgPopupEvent")]
    popup: Option<XmlSubscriptionList>,
    #[serde(rename = "SubscribeMsgChangeEvent")]
    change: Option<XmlSubscriptionList>,
    #[serde(rename = "SubscribeMsgSentEvent")]
    sent: Option<XmlSubscriptionList>,
}

/// Parse a decrypted (or plaintext) payload into an [`InboundMessage`].
///
/// A malformed subscription list yields [`WebhookError::MalformedList`],
/// which still carries the decoded message.
pub fn parse_message(raw: &[u8], format: WireFormat) -> Result<InboundMessage> {
    let header: MessageHeader = format.decode(raw)?;

    let body = match &header.msg_type {
        MsgType::Text => MessageBody::Text(format.decode(raw)?),
        MsgType::Image => MessageBody::Image(format.decode(raw)?),
        MsgType::Voice => MessageBody::Voice(format.decode(raw)?),
        MsgType::Video => MessageBody::Video(format.decode(raw)?),
        MsgType::ShortVideo => MessageBody::ShortVideo(format.decode(raw)?),
        MsgType::Location => MessageBody::Location(format.decode(raw)?),
        MsgType::Link => MessageBody::Link(format.decode(raw)?),
        MsgType::MiniProgramPage => MessageBody::MiniProgramPage(format.decode(raw)?),
        MsgType::Event => MessageBody::Event(parse_event(format.decode(raw)?)),
        other => {
            debug!(msg_type = %other, "message_kind_unmodelled");
            MessageBody::Unknown
        }
    };

    let mut message = InboundMessage { header, body };

    let subscription_kind = match &message.body {
        MessageBody::Event(Event::Subscription(sub)) => Some(sub.kind),
        _ => None,
    };

    if let Some(kind) = subscription_kind {
        match extract_subscription_list(raw, format, kind) {
            Ok(list) => {
                if let MessageBody::Event(Event::Subscription(sub)) = &mut message.body {
                    sub.items = list;
                }
            }
            Err(reason) => {
                warn!(format = %format, reason = %reason, "subscription_list_malformed");
                return Err(WebhookError::MalformedList {
                    reason,
                    partial: Box::new(message),
                });
            }
        }
    }

    debug!(
        msg_type = %message.header.msg_type,
        event = ?message.header.event,
        format = %format,
        "message_parsed"
    );

    Ok(message)
}

fn parse_event(fields: EventFields) -> Event {
    let name = fields.event.trim().to_ascii_lowercase();
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

    match name.as_str() {
        "subscribe" => Event::Subscribe {
            event_key: non_empty(&fields.event_key),
            ticket: non_empty(&fields.ticket),
        },
        "unsubscribe" => Event::Unsubscribe,
        "scan" => Event::Scan {
            event_key: fields.key(),
            ticket: non_empty(&fields.ticket),
        },
        "location" => Event::Location {
            latitude: fields.latitude,
            longitude: fields.longitude,
            precision: fields.precision,
        },
        "click" => Event::Click {
            event_key: fields.key(),
        },
        "view" => Event::View {
            url: fields.key(),
            menu_id: fields.menu_id,
        },
        "scancode_push" => Event::ScanCodePush(ScanCodeEvent {
            event_key: fields.key(),
            info: fields.scan_code_info,
        }),
        "scancode_waitmsg" => Event::ScanCodeWaitMsg(ScanCodeEvent {
            event_key: fields.key(),
            info: fields.scan_code_info,
        }),
        "pic_sysphoto" => Event::PicSysPhoto(PicturesEvent {
            event_key: fields.key(),
            info: fields.send_pics_info,
        }),
        "pic_photo_or_album" => Event::PicPhotoOrAlbum(PicturesEvent {
            event_key: fields.key(),
            info: fields.send_pics_info,
        }),
        "pic_weixin" => Event::PicWeixin(PicturesEvent {
            event_key: fields.key(),
            info: fields.send_pics_info,
        }),
        "location_select" => Event::LocationSelect {
            event_key: fields.key(),
            info: fields.send_location_info,
        },
        "templatesendjobfinish" => Event::TemplateSendJobFinish(fields.job()),
        "masssendjobfinish" => Event::MassSendJobFinish(fields.job()),
        "subscribe_msg_popup_event" => subscription(SubscriptionKind::Popup),
        "subscribe_msg_change_event" => subscription(SubscriptionKind::Change),
        "subscribe_msg_sent_event" => subscription(SubscriptionKind::Sent),
        _ => Event::Other {
            event: fields.event,
            event_key: non_empty(&fields.event_key),
        },
    }
}

fn subscription(kind: SubscriptionKind) -> Event {
    Event::Subscription(SubscriptionEvent {
        kind,
        items: Vec::new(),
    })
}

/// Pull the subscribe-message entries out of the raw payload.
fn extract_subscription_list(
    raw: &[u8],
    format: WireFormat,
    kind: SubscriptionKind,
) -> std::result::Result<Vec<SubscriptionItem>, String> {
    match format {
        WireFormat::Json => {
            let document: Value = serde_json::from_slice(raw).map_err(|e| e.to_string())?;
            one_or_many(document.get("List")).map_err(|e| e.to_string())
        }
        WireFormat::Xml => {
            let lists: XmlSubscriptionLists = format.decode(raw).map_err(|e| e.to_string())?;
            let wrapper = match kind {
                SubscriptionKind::Popup => lists.popup,
                SubscriptionKind::Change => lists.change,
                SubscriptionKind::Sent => lists.sent,
            };
            Ok(wrapper.map(|w| w.list).unwrap_or_default())
        }
    }
}

/// Normalize a field that holds either one object or an array of them.
///
/// A missing or `null` field is an empty sequence.
pub fn one_or_many<T: DeserializeOwned>(value: Option<&Value>) -> serde_json::Result<Vec<T>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(array @ Value::Array(_)) => Vec::<T>::deserialize(array),
        Some(object @ Value::Object(_)) => Ok(vec![T::deserialize(object)?]),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected object or array, found {other}"
        ))),
    }
}
