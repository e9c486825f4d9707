use async_trait::async_trait;

use crate::{
    domain::{MessageRef, Recipient},
    messaging::types::BotCommand,
    Result,
};

/// Outbound side of the messaging platform.
///
/// Implementations must tolerate concurrent calls from many handler
/// invocations; the relay shares one instance across all of them.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Verify the credential and return the bot's username.
    async fn identity(&self) -> Result<String>;

    async fn send_text(&self, to: Recipient, text: &str) -> Result<MessageRef>;

    /// Forward an existing message, keeping its original attribution.
    async fn forward(&self, to: Recipient, message: MessageRef) -> Result<MessageRef>;

    /// Replace the user-facing command menu.
    async fn set_commands(&self, commands: &[BotCommand]) -> Result<()>;
}
