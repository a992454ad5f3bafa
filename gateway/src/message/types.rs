//! Inbound message and event types.
//!
//! Element names follow the platform's XML tags; the JSON push format uses
//! the same names as object keys, so one set of serde attributes serves both.

use serde::{Deserialize, Deserializer, Serialize};

/// Decode an optional integer that XML may send as an empty element.
///
/// `<MenuId></MenuId>`, a blank string and `null` all become `None`;
/// numeric text and JSON numbers become `Some`.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse().map(Some).map_err(serde::de::Error::custom)
            }
        }
    }
}

// =============================================================================
// Message Kind
// =============================================================================

/// The `MsgType` discriminant shared by inbound messages and replies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MsgType {
    Text,
    Image,
    Voice,
    Video,
    ShortVideo,
    Location,
    Link,
    MiniProgramPage,
    Music,
    News,
    Event,
    TransferCustomerService,
    Other(String),
}

impl MsgType {
    pub fn as_str(&self) -> &str {
        match self {
            MsgType::Text => "text",
            MsgType::Image => "image",
            MsgType::Voice => "voice",
            MsgType::Video => "video",
            MsgType::ShortVideo => "shortvideo",
            MsgType::Location => "location",
            MsgType::Link => "link",
            MsgType::MiniProgramPage => "miniprogrampage",
            MsgType::Music => "music",
            MsgType::News => "news",
            MsgType::Event => "event",
            MsgType::TransferCustomerService => "transfer_customer_service",
            MsgType::Other(raw) => raw,
        }
    }
}

impl From<&str> for MsgType {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "text" => MsgType::Text,
            "image" => MsgType::Image,
            "voice" => MsgType::Voice,
            "video" => MsgType::Video,
            "shortvideo" => MsgType::ShortVideo,
            "location" => MsgType::Location,
            "link" => MsgType::Link,
            "miniprogrampage" => MsgType::MiniProgramPage,
            "music" => MsgType::Music,
            "news" => MsgType::News,
            "event" => MsgType::Event,
            "transfer_customer_service" => MsgType::TransferCustomerService,
            other => MsgType::Other(other.to_string()),
        }
    }
}

impl From<String> for MsgType {
    fn from(raw: String) -> Self {
        MsgType::from(raw.as_str())
    }
}

impl From<MsgType> for String {
    fn from(kind: MsgType) -> Self {
        match kind {
            MsgType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Header
// =============================================================================

/// Routing fields present on every callback. Decoded first to pick the
/// kind-specific payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageHeader {
    /// The account that received the message
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: String,
    /// The user (open id) that sent it
    #[serde(rename = "FromUserName", default)]
    pub from_user_name: String,
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    /// Event name, only on `event` messages
    #[serde(rename = "Event", default)]
    pub event: Option<String>,
}

// =============================================================================
// Message Payloads
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextMessage {
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "MsgId", deserialize_with = "lenient_i64")]
    pub msg_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImageMessage {
    #[serde(rename = "PicUrl")]
    pub pic_url: String,
    #[serde(rename = "MediaId")]
    pub media_id: String,
    #[serde(rename = "MsgId", deserialize_with = "lenient_i64")]
    pub msg_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VoiceMessage {
    #[serde(rename = "MediaId")]
    pub media_id: String,
    #[serde(rename = "Format")]
    pub format: String,
    /// Speech recognition result, when enabled on the account
    #[serde(rename = "Recognition")]
    pub recognition: Option<String>,
    #[serde(rename = "MsgId", deserialize_with = "lenient_i64")]
    pub msg_id: Option<i64>,
}

/// Payload of both `video` and `shortvideo` messages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VideoMessage {
    #[serde(rename = "MediaId")]
    pub media_id: String,
    #[serde(rename = "ThumbMediaId")]
    pub thumb_media_id: String,
    #[serde(rename = "MsgId", deserialize_with = "lenient_i64")]
    pub msg_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationMessage {
    #[serde(rename = "Location_X")]
    pub location_x: f64,
    #[serde(rename = "Location_Y")]
    pub location_y: f64,
    #[serde(rename = "Scale")]
    pub scale: i64,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "MsgId", deserialize_with = "lenient_i64")]
    pub msg_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinkMessage {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "MsgId", deserialize_with = "lenient_i64")]
    pub msg_id: Option<i64>,
}

/// A mini program card sent through customer service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MiniProgramPageMessage {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "AppId")]
    pub app_id: String,
    #[serde(rename = "PagePath")]
    pub page_path: String,
    #[serde(rename = "ThumbUrl")]
    pub thumb_url: String,
    #[serde(rename = "ThumbMediaId")]
    pub thumb_media_id: String,
    #[serde(rename = "MsgId", deserialize_with = "lenient_i64")]
    pub msg_id: Option<i64>,
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanCodeInfo {
    #[serde(rename = "ScanType")]
    pub scan_type: String,
    #[serde(rename = "ScanResult")]
    pub scan_result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SendPicsInfo {
    #[serde(rename = "Count")]
    pub count: i64,
    #[serde(rename = "PicList")]
    pub pic_list: PicList,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PicList {
    #[serde(rename = "item")]
    pub items: Vec<EventPic>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventPic {
    #[serde(rename = "PicMd5Sum")]
    pub pic_md5_sum: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SendLocationInfo {
    #[serde(rename = "Location_X")]
    pub location_x: f64,
    #[serde(rename = "Location_Y")]
    pub location_y: f64,
    #[serde(rename = "Scale")]
    pub scale: i64,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Poiname")]
    pub poi_name: Option<String>,
}

/// One entry of a subscribe-message `List`.
///
/// Popup, change and sent notifications share this shape; each fills a
/// different subset of the fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionItem {
    #[serde(rename = "TemplateId")]
    pub template_id: String,
    #[serde(rename = "SubscribeStatusString", skip_serializing_if = "Option::is_none")]
    pub subscribe_status: Option<String>,
    #[serde(rename = "PopupScene", skip_serializing_if = "Option::is_none")]
    pub popup_scene: Option<String>,
    #[serde(rename = "MsgID", skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(rename = "ErrorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "ErrorStatus", skip_serializing_if = "Option::is_none")]
    pub error_status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// The user answered a subscription popup
    Popup,
    /// The user changed a subscription in settings
    Change,
    /// A subscribe message was delivered
    Sent,
}

impl SubscriptionKind {
    /// XML element wrapping the `List` entries.
    pub fn xml_wrapper(self) -> &'static str {
        match self {
            SubscriptionKind::Popup => "SubscribeMsgPopupEvent",
            SubscriptionKind::Change => "SubscribeMsgChangeEvent",
            SubscriptionKind::Sent => "SubscribeMsgSentEvent",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEvent {
    pub kind: SubscriptionKind,
    pub items: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanCodeEvent {
    pub event_key: String,
    pub info: ScanCodeInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PicturesEvent {
    pub event_key: String,
    pub info: SendPicsInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobFinishEvent {
    /// Job id, sent as `MsgID`
    pub msg_id: Option<i64>,
    pub status: String,
    pub total_count: Option<i64>,
    pub filter_count: Option<i64>,
    pub sent_count: Option<i64>,
    pub error_count: Option<i64>,
}

/// A push event, keyed by the `Event` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Follow; `event_key` is `qrscene_<id>` when following via a QR code
    Subscribe {
        event_key: Option<String>,
        ticket: Option<String>,
    },
    Unsubscribe,
    /// An already-following user scanned a parametric QR code
    Scan {
        event_key: String,
        ticket: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        precision: f64,
    },
    Click {
        event_key: String,
    },
    View {
        url: String,
        menu_id: Option<i64>,
    },
    ScanCodePush(ScanCodeEvent),
    ScanCodeWaitMsg(ScanCodeEvent),
    PicSysPhoto(PicturesEvent),
    PicPhotoOrAlbum(PicturesEvent),
    PicWeixin(PicturesEvent),
    LocationSelect {
        event_key: String,
        info: SendLocationInfo,
    },
    TemplateSendJobFinish(JobFinishEvent),
    MassSendJobFinish(JobFinishEvent),
    Subscription(SubscriptionEvent),
    Other {
        event: String,
        event_key: Option<String>,
    },
}

// =============================================================================
// Normalized Message
// =============================================================================

/// Kind-specific body of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text(TextMessage),
    Image(ImageMessage),
    Voice(VoiceMessage),
    Video(VideoMessage),
    ShortVideo(VideoMessage),
    Location(LocationMessage),
    Link(LinkMessage),
    MiniProgramPage(MiniProgramPageMessage),
    Event(Event),
    /// A kind this gateway does not model; inspect the raw payload instead
    Unknown,
}

/// A parsed inbound callback.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub header: MessageHeader,
    pub body: MessageBody,
}

impl InboundMessage {
    pub fn msg_type(&self) -> &MsgType {
        &self.header.msg_type
    }

    pub fn from_user_name(&self) -> &str {
        &self.header.from_user_name
    }

    pub fn to_user_name(&self) -> &str {
        &self.header.to_user_name
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(text) => Some(&text.content),
            _ => None,
        }
    }

    pub fn event(&self) -> Option<&Event> {
        match &self.body {
            MessageBody::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Subscribe-message entries, empty for every other kind.
    pub fn subscriptions(&self) -> &[SubscriptionItem] {
        match &self.body {
            MessageBody::Event(Event::Subscription(sub)) => &sub.items,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_roundtrip_strings() {
        for raw in ["text", "image", "shortvideo", "event", "transfer_customer_service"] {
            assert_eq!(MsgType::from(raw).as_str(), raw);
        }
        assert_eq!(MsgType::from("card"), MsgType::Other("card".into()));
        assert_eq!(String::from(MsgType::Other("card".into())), "card");
    }

    #[test]
    fn test_msg_type_serde_as_string() {
        let json = serde_json::to_string(&MsgType::News).unwrap();
        assert_eq!(json, "\"news\"");
        let parsed: MsgType = serde_json::from_str("\"voice\"").unwrap();
        assert_eq!(parsed, MsgType::Voice);
    }

    #[test]
    fn test_subscriptions_empty_for_text() {
        let message = InboundMessage {
            header: MessageHeader {
                to_user_name: "gh_x".into(),
                from_user_name: "userA".into(),
                create_time: 1,
                msg_type: MsgType::Text,
                event: None,
            },
            body: MessageBody::Text(TextMessage {
                content: "hi".into(),
                msg_id: None,
            }),
        };
        assert!(message.subscriptions().is_empty());
        assert_eq!(message.text(), Some("hi"));
        assert!(message.event().is_none());
    }
}
