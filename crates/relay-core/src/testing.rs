//! In-memory messenger shared by the unit tests.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef, Recipient},
    errors::Error,
    messaging::{port::MessagingPort, types::BotCommand},
    Result,
};

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sends: Mutex<Vec<(Recipient, String)>>,
    forwards: Mutex<Vec<(Recipient, MessageRef)>>,
    commands: Mutex<Vec<Vec<BotCommand>>>,
    failing: HashSet<ChatId>,
    fail_commands: bool,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    /// Every call addressed to one of `chats` fails.
    pub fn failing_for(chats: &[i64]) -> Self {
        Self {
            failing: chats.iter().copied().map(ChatId).collect(),
            ..Self::new()
        }
    }

    pub fn rejecting_commands() -> Self {
        Self {
            fail_commands: true,
            ..Self::new()
        }
    }

    pub fn sends(&self) -> Vec<(Recipient, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn forwards(&self) -> Vec<(Recipient, MessageRef)> {
        self.forwards.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<Vec<BotCommand>> {
        self.commands.lock().unwrap().clone()
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }

    fn check(&self, to: Recipient) -> Result<()> {
        if self.failing.contains(&to.address()) {
            return Err(Error::Messaging(format!("chat {to} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn identity(&self) -> Result<String> {
        Ok("relay_test_bot".to_string())
    }

    async fn send_text(&self, to: Recipient, text: &str) -> Result<MessageRef> {
        self.sends.lock().unwrap().push((to, text.to_string()));
        self.check(to)?;
        Ok(self.alloc(to.address()))
    }

    async fn forward(&self, to: Recipient, message: MessageRef) -> Result<MessageRef> {
        self.forwards.lock().unwrap().push((to, message));
        self.check(to)?;
        Ok(self.alloc(to.address()))
    }

    async fn set_commands(&self, commands: &[BotCommand]) -> Result<()> {
        self.commands.lock().unwrap().push(commands.to_vec());
        if self.fail_commands {
            return Err(Error::Messaging("Bad Request: invalid command".to_string()));
        }
        Ok(())
    }
}
