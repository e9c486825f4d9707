//! Telegram update handlers.
//!
//! Converts each message into a platform-neutral [`InboundEvent`] and hands
//! it to the relay dispatcher. Handler outcomes never surface as errors to
//! teloxide.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Chat, Message},
};

use relay_core::{
    dispatch::Dispatcher as RelayDispatcher,
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{ChatKind, EventKind, InboundEvent},
};

pub async fn handle_message(msg: Message, relay: Arc<RelayDispatcher>) -> ResponseResult<()> {
    let event = inbound_event(&msg);
    let outcome = relay.handle(&event).await;
    tracing::debug!(chat = %event.chat_id, ?outcome, "message handled");
    Ok(())
}

pub fn inbound_event(msg: &Message) -> InboundEvent {
    InboundEvent {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: chat_kind(&msg.chat),
        message: message_ref(msg),
        kind: event_kind(msg),
        reply_to: msg.reply_to_message().map(message_ref),
    }
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    }
}

fn event_kind(msg: &Message) -> EventKind {
    if let Some(text) = msg.text() {
        return EventKind::Text(text.to_string());
    }
    if msg.photo().is_some() {
        return EventKind::Photo;
    }
    EventKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> serde_json::Value {
        json!({"id": 100, "is_bot": false, "first_name": "Ann"})
    }

    fn private_chat() -> serde_json::Value {
        json!({"id": 100, "type": "private", "first_name": "Ann"})
    }

    fn parse(v: serde_json::Value) -> Message {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn private_text_becomes_text_event() {
        let msg = parse(json!({
            "message_id": 7,
            "date": 1700000000,
            "from": user(),
            "chat": private_chat(),
            "text": "/id"
        }));

        let ev = inbound_event(&msg);
        assert_eq!(ev.chat_id, ChatId(100));
        assert_eq!(ev.chat_kind, ChatKind::Private);
        assert_eq!(ev.message.message_id, MessageId(7));
        assert_eq!(ev.kind, EventKind::Text("/id".to_string()));
        assert!(!ev.is_reply());
    }

    #[test]
    fn group_reply_keeps_reply_target() {
        let group = json!({"id": -42, "type": "group", "title": "Ops"});
        let msg = parse(json!({
            "message_id": 9,
            "date": 1700000001,
            "from": user(),
            "chat": group.clone(),
            "text": "/fwd",
            "reply_to_message": {
                "message_id": 5,
                "date": 1700000000,
                "from": user(),
                "chat": group,
                "text": "original"
            }
        }));

        let ev = inbound_event(&msg);
        assert_eq!(ev.chat_kind, ChatKind::Group);
        assert_eq!(
            ev.reply_to,
            Some(MessageRef {
                chat_id: ChatId(-42),
                message_id: MessageId(5),
            })
        );
    }

    #[test]
    fn captioned_photo_becomes_photo_event() {
        let msg = parse(json!({
            "message_id": 11,
            "date": 1700000002,
            "from": user(),
            "chat": private_chat(),
            "photo": [{
                "file_id": "AgAD",
                "file_unique_id": "AQAD",
                "width": 90,
                "height": 60,
                "file_size": 1024
            }],
            "caption": "look"
        }));

        let ev = inbound_event(&msg);
        assert_eq!(ev.kind, EventKind::Photo);
    }

    #[test]
    fn supergroup_is_not_private() {
        let msg = parse(json!({
            "message_id": 3,
            "date": 1700000003,
            "from": user(),
            "chat": {"id": -1001234567890_i64, "type": "supergroup", "title": "Big"},
            "text": "hello"
        }));

        let ev = inbound_event(&msg);
        assert_eq!(ev.chat_kind, ChatKind::Supergroup);
        assert!(!ev.chat_kind.is_private());
    }
}
