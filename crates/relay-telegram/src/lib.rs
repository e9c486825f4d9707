//! Telegram adapter (teloxide).
//!
//! Implements the `relay-core` MessagingPort over the Telegram Bot API and
//! provides the long-polling receive loop as a lifecycle service.

use async_trait::async_trait;

use teloxide::{prelude::*, types::BotCommand as TgBotCommand};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

pub use teloxide::Bot;

use relay_core::{
    domain::{ChatId, MessageId, MessageRef, Recipient},
    errors::Error,
    messaging::{port::MessagingPort, types::BotCommand},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Messaging(format!("telegram error: {e}"))
    }

    /// Telegram's flood control names how long to back off; honor that once.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::debug!(wait_secs = d.as_secs(), "telegram asked to retry later");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn identity(&self) -> Result<String> {
        let me = self.with_retry(|| self.bot.get_me()).await?;
        Ok(me.username().to_string())
    }

    async fn send_text(&self, to: Recipient, text: &str) -> Result<MessageRef> {
        let chat_id = to.address();
        let msg = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn forward(&self, to: Recipient, message: MessageRef) -> Result<MessageRef> {
        let chat_id = to.address();
        let msg = self
            .with_retry(|| {
                self.bot.forward_message(
                    Self::tg_chat(chat_id),
                    Self::tg_chat(message.chat_id),
                    Self::tg_msg_id(message.message_id),
                )
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn set_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let commands: Vec<TgBotCommand> = commands
            .iter()
            .map(|c| TgBotCommand::new(c.command.clone(), c.description.clone()))
            .collect();

        self.with_retry(|| self.bot.set_my_commands(commands.clone()))
            .await?;
        Ok(())
    }
}
