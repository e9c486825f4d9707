use crate::domain::{ChatId, MessageRef};

/// Kind of conversation an event arrived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }
}

/// Payload of an inbound event, as far as routing cares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Text(String),
    Photo,
    Other,
}

/// One received message, platform specifics stripped.
#[derive(Clone, Debug)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    /// The event's own message.
    pub message: MessageRef,
    pub kind: EventKind,
    /// Message this one replies to, if any.
    pub reply_to: Option<MessageRef>,
}

impl InboundEvent {
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

/// Entry in the platform's command menu. `command` carries no leading `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: &str, description: impl Into<String>) -> Self {
        Self {
            command: command.trim_start_matches('/').to_string(),
            description: description.into(),
        }
    }
}

/// A `/command` at the start of a text, with the `@botname` it was addressed
/// to, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    pub name: &'a str,
    pub addressee: Option<&'a str>,
}

impl Command<'_> {
    /// Unaddressed commands are for every bot in the chat.
    pub fn is_for(&self, username: &str) -> bool {
        self.addressee
            .map_or(true, |to| to.eq_ignore_ascii_case(username))
    }
}

/// Parse the leading `/cmd` or `/cmd@botname` token. Arguments are ignored.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let (name, addressee) = match first.split_once('@') {
        Some((name, to)) => (name, Some(to).filter(|to| !to.is_empty())),
        None => (first, None),
    };
    if name.len() <= 1 {
        return None;
    }
    Some(Command { name, addressee })
}
