//! wxgate - WeChat-style webhook gateway.
//!
//! Authenticates platform callbacks, unwraps safe-mode envelopes, parses the
//! message into typed form, and turns the application's reply back into a
//! (possibly encrypted) response body.
//!
//! ## Architecture
//!
//! ```text
//! POST callback → signature check → envelope → decrypt → parse
//!               → MessageHandler → stamp + serialize → encrypt → response
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod message;
pub mod reply;
pub mod web;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::WireFormat;
pub use config::Config;
pub use crypto::MessageCrypt;
pub use error::{Result, SignatureScope, WebhookError};
pub use exchange::{CallbackQuery, Exchange, InboundOptions, InboundRequest, Mode};
pub use handler::{EchoHandler, MessageHandler};
pub use message::{Event, InboundMessage, MessageBody, MsgType};
pub use reply::{Reply, ReplyData};
pub use web::{router, AppState};
