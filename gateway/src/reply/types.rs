//! Passive reply payloads.
//!
//! Each reply serializes to a `<xml>` document carrying the four routing
//! fields followed by its kind-specific body. Routing fields are filled in by
//! [`Stampable::set_routing`] just before serialization.

use serde::{Deserialize, Serialize};

use crate::message::MsgType;

/// Replies whose routing fields can be set in place.
pub trait Stampable {
    fn set_routing(&mut self, to_user_name: &str, from_user_name: &str, msg_type: MsgType, create_time: i64);
}

macro_rules! impl_stampable {
    ($($reply:ty),+ $(,)?) => {
        $(
            impl Stampable for $reply {
                fn set_routing(
                    &mut self,
                    to_user_name: &str,
                    from_user_name: &str,
                    msg_type: MsgType,
                    create_time: i64,
                ) {
                    self.to_user_name = to_user_name.to_string();
                    self.from_user_name = from_user_name.to_string();
                    self.msg_type = msg_type;
                    self.create_time = create_time;
                }
            }
        )+
    };
}

impl_stampable!(TextReply, ImageReply, VoiceReply, VideoReply, MusicReply, NewsReply, TransferReply);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct TextReply {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "Content")]
    pub content: String,
}

impl TextReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            to_user_name: String::new(),
            from_user_name: String::new(),
            create_time: 0,
            msg_type: MsgType::Text,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(rename = "MediaId")]
    pub media_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct ImageReply {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "Image")]
    pub image: MediaRef,
}

impl ImageReply {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            to_user_name: String::new(),
            from_user_name: String::new(),
            create_time: 0,
            msg_type: MsgType::Image,
            image: MediaRef {
                media_id: media_id.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct VoiceReply {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "Voice")]
    pub voice: MediaRef,
}

impl VoiceReply {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            to_user_name: String::new(),
            from_user_name: String::new(),
            create_time: 0,
            msg_type: MsgType::Voice,
            voice: MediaRef {
                media_id: media_id.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBody {
    #[serde(rename = "MediaId")]
    pub media_id: String,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct VideoReply {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "Video")]
    pub video: VideoBody,
}

impl VideoReply {
    pub fn new(media_id: impl Into<String>, title: Option<String>, description: Option<String>) -> Self {
        Self {
            to_user_name: String::new(),
            from_user_name: String::new(),
            create_time: 0,
            msg_type: MsgType::Video,
            video: VideoBody {
                media_id: media_id.into(),
                title,
                description,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicBody {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "MusicUrl")]
    pub music_url: String,
    #[serde(rename = "HQMusicUrl")]
    pub hq_music_url: String,
    #[serde(rename = "ThumbMediaId")]
    pub thumb_media_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct MusicReply {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "Music")]
    pub music: MusicBody,
}

impl MusicReply {
    pub fn new(music: MusicBody) -> Self {
        Self {
            to_user_name: String::new(),
            from_user_name: String::new(),
            create_time: 0,
            msg_type: MsgType::Music,
            music,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "PicUrl")]
    pub pic_url: String,
    #[serde(rename = "Url")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Articles {
    #[serde(rename = "item", default)]
    pub items: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct NewsReply {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "ArticleCount")]
    pub article_count: usize,
    #[serde(rename = "Articles")]
    pub articles: Articles,
}

impl NewsReply {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            to_user_name: String::new(),
            from_user_name: String::new(),
            create_time: 0,
            msg_type: MsgType::News,
            article_count: articles.len(),
            articles: Articles { items: articles },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransInfo {
    #[serde(rename = "KfAccount")]
    pub kf_account: String,
}

/// Hands the conversation to customer service, optionally to one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "xml")]
pub struct TransferReply {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "TransInfo", default, skip_serializing_if = "Option::is_none")]
    pub trans_info: Option<TransInfo>,
}

impl TransferReply {
    pub fn new(kf_account: Option<String>) -> Self {
        Self {
            to_user_name: String::new(),
            from_user_name: String::new(),
            create_time: 0,
            msg_type: MsgType::TransferCustomerService,
            trans_info: kf_account.map(|kf_account| TransInfo { kf_account }),
        }
    }
}

/// Reply payload, one variant per supported kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyData {
    Text(TextReply),
    Image(ImageReply),
    Voice(VoiceReply),
    Video(VideoReply),
    Music(MusicReply),
    News(NewsReply),
    Transfer(TransferReply),
}

impl ReplyData {
    /// The kind this payload serializes as.
    pub fn kind(&self) -> MsgType {
        match self {
            ReplyData::Text(_) => MsgType::Text,
            ReplyData::Image(_) => MsgType::Image,
            ReplyData::Voice(_) => MsgType::Voice,
            ReplyData::Video(_) => MsgType::Video,
            ReplyData::Music(_) => MsgType::Music,
            ReplyData::News(_) => MsgType::News,
            ReplyData::Transfer(_) => MsgType::TransferCustomerService,
        }
    }
}

impl Stampable for ReplyData {
    fn set_routing(&mut self, to_user_name: &str, from_user_name: &str, msg_type: MsgType, create_time: i64) {
        match self {
            ReplyData::Text(r) => r.set_routing(to_user_name, from_user_name, msg_type, create_time),
            ReplyData::Image(r) => r.set_routing(to_user_name, from_user_name, msg_type, create_time),
            ReplyData::Voice(r) => r.set_routing(to_user_name, from_user_name, msg_type, create_time),
            ReplyData::Video(r) => r.set_routing(to_user_name, from_user_name, msg_type, create_time),
            ReplyData::Music(r) => r.set_routing(to_user_name, from_user_name, msg_type, create_time),
            ReplyData::News(r) => r.set_routing(to_user_name, from_user_name, msg_type, create_time),
            ReplyData::Transfer(r) => r.set_routing(to_user_name, from_user_name, msg_type, create_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_xml;

    fn xml(data: &ReplyData) -> String {
        String::from_utf8(to_xml(data).unwrap()).unwrap()
    }

    #[test]
    fn test_set_routing_overwrites_fields() {
        let mut reply = ReplyData::Text(TextReply::new("hi"));
        reply.set_routing("userA", "gh_x", MsgType::Text, 1700000000);

        match reply {
            ReplyData::Text(text) => {
                assert_eq!(text.to_user_name, "userA");
                assert_eq!(text.from_user_name, "gh_x");
                assert_eq!(text.create_time, 1700000000);
                assert_eq!(text.content, "hi");
            }
            other => panic!("Expected text reply, got {other:?}"),
        }
    }

    #[test]
    fn test_image_reply_xml() {
        let mut reply = ReplyData::Image(ImageReply::new("media-1"));
        reply.set_routing("u", "gh", MsgType::Image, 5);
        assert_eq!(
            xml(&reply),
            "<xml><ToUserName>u</ToUserName><FromUserName>gh</FromUserName>\
             <CreateTime>5</CreateTime><MsgType>image</MsgType>\
             <Image><MediaId>media-1</MediaId></Image></xml>"
        );
    }

    #[test]
    fn test_news_reply_lists_items() {
        let reply = ReplyData::News(NewsReply::new(vec![
            Article {
                title: "one".into(),
                ..Article::default()
            },
            Article {
                title: "two".into(),
                ..Article::default()
            },
        ]));
        let text = xml(&reply);
        assert!(text.contains("<ArticleCount>2</ArticleCount>"));
        assert_eq!(text.matches("<item>").count(), 2);
        assert!(text.contains("<Title>two</Title>"));
    }

    #[test]
    fn test_video_reply_omits_missing_title() {
        let reply = ReplyData::Video(VideoReply::new("m", None, Some("desc".into())));
        let text = xml(&reply);
        assert!(!text.contains("<Title>"));
        assert!(text.contains("<Description>desc</Description>"));
    }

    #[test]
    fn test_transfer_reply_kind_and_account() {
        let reply = ReplyData::Transfer(TransferReply::new(Some("kf2001@account".into())));
        assert_eq!(reply.kind(), MsgType::TransferCustomerService);
        let text = xml(&reply);
        assert!(text.contains("<MsgType>transfer_customer_service</MsgType>"));
        assert!(text.contains("<TransInfo><KfAccount>kf2001@account</KfAccount></TransInfo>"));
    }
}
