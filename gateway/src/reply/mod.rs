//! Passive replies to inbound messages.
//!
//! ```text
//! Reply → build_response() → stamp routing → serialize → BuiltReply
//! ```

pub mod builder;
pub mod types;

pub use builder::{build_response, is_supported_reply_kind, BuiltReply, Reply};
pub use types::{
    Article, Articles, ImageReply, MediaRef, MusicBody, MusicReply, NewsReply, ReplyData,
    Stampable, TransInfo, TransferReply, TextReply, VideoBody, VideoReply, VoiceReply,
};
