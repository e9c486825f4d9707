use std::fmt;

/// Telegram chat id (numeric). Groups and channels are negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram message id (numeric, unique within a chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// An addressable destination for a send or forward.
///
/// Kept apart from [`ChatId`] so a raw id read from an event is never passed
/// where a configured destination is expected (and vice versa).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Recipient(ChatId);

impl Recipient {
    pub fn new(chat_id: ChatId) -> Self {
        Self(chat_id)
    }

    /// Platform address of this recipient.
    pub fn address(&self) -> ChatId {
        self.0
    }
}

impl From<ChatId> for Recipient {
    fn from(chat_id: ChatId) -> Self {
        Self(chat_id)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_text_is_decimal_chat_id() {
        assert_eq!(Recipient::new(ChatId(42)).to_string(), "42");
        assert_eq!(
            Recipient::from(ChatId(-1001234567890)).to_string(),
            "-1001234567890"
        );
    }
}
