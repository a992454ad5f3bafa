//! Normalized inbound messages.
//!
//! ## Parsing Flow
//!
//! ```text
//! payload bytes → parse_message() → InboundMessage { header, body }
//! ```

pub mod parser;
pub mod types;

pub use parser::{one_or_many, parse_message};
pub use types::{
    Event, EventPic, ImageMessage, InboundMessage, JobFinishEvent, LinkMessage, LocationMessage,
    MessageBody, MessageHeader, MiniProgramPageMessage, MsgType, PicList, PicturesEvent,
    ScanCodeEvent, ScanCodeInfo, SendLocationInfo, SendPicsInfo, SubscriptionEvent,
    SubscriptionItem, SubscriptionKind, TextMessage, VideoMessage, VoiceMessage,
};
