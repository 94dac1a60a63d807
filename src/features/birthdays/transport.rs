//! Outgoing message model and the transport seam
//!
//! The flows only speak in `Outbound` values; a binding (Discord, or a
//! recorder in tests) decides how keyboards and reply requests are rendered.

use anyhow::Result;
use async_trait::async_trait;

use super::dialog::FlowToken;
use super::model::ConversationId;

/// Transport-assigned id of a delivered message
pub type MessageId = u64;

/// One selectable entry of a keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Empty placeholder cell; selecting it does nothing
    pub fn blank() -> Self {
        Self::new(" ", super::keyboards::BLANK)
    }

    pub fn is_blank(&self) -> bool {
        self.value == super::keyboards::BLANK
    }
}

/// Rows of choices; every callback from it echoes `token`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub token: FlowToken,
    pub rows: Vec<Vec<Choice>>,
}

impl Keyboard {
    pub fn choices(&self) -> impl Iterator<Item = &Choice> {
        self.rows.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    New,
    /// Edit an earlier bot message in place
    Replace(MessageId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub conversation_id: ConversationId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// The bot expects the user to answer this message with a text reply
    pub expects_reply: bool,
    pub delivery: Delivery,
}

impl Outbound {
    pub fn text(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation_id,
            text: text.into(),
            keyboard: None,
            expects_reply: false,
            delivery: Delivery::New,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn expecting_reply(mut self) -> Self {
        self.expects_reply = true;
        self
    }

    pub fn replacing(mut self, message_id: MessageId) -> Self {
        self.delivery = Delivery::Replace(message_id);
        self
    }
}

/// Delivers messages to a conversation
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send or edit a message, returning the id of the delivered message
    async fn deliver(&self, message: Outbound) -> Result<MessageId>;
}
