//! The application seam: turn an inbound message into an optional reply.

use crate::message::{Event, InboundMessage, MessageBody};
use crate::reply::Reply;

pub const WELCOME_TEXT: &str = "Thanks for following!";

/// Decides the passive reply for each inbound message.
///
/// Returning `None` sends an empty response, which the platform reads as
/// "no reply".
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &InboundMessage) -> Option<Reply>;
}

impl<F> MessageHandler for F
where
    F: Fn(&InboundMessage) -> Option<Reply> + Send + Sync,
{
    fn handle(&self, message: &InboundMessage) -> Option<Reply> {
        self(message)
    }
}

/// Echoes text back and greets new followers.
#[derive(Debug, Clone, Default)]
pub struct EchoHandler {
    prefix: Option<String>,
}

impl EchoHandler {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }
}

impl MessageHandler for EchoHandler {
    fn handle(&self, message: &InboundMessage) -> Option<Reply> {
        match &message.body {
            MessageBody::Text(text) => {
                let content = match &self.prefix {
                    Some(prefix) => format!("{prefix}{}", text.content),
                    None => text.content.clone(),
                };
                Some(Reply::text(content))
            }
            MessageBody::Event(Event::Subscribe { .. }) => Some(Reply::text(WELCOME_TEXT)),
            _ => None,
        }
    }
}
