use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef, Recipient},
    messaging::{port::MessagingPort, types::BotCommand},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls addressed to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

/// Next free send slot for the bot as a whole and for each chat that still
/// has one pending.
#[derive(Debug)]
struct Schedule {
    global_next: Instant,
    chats: HashMap<ChatId, Instant>,
}

impl Schedule {
    fn new() -> Self {
        Self {
            global_next: Instant::now(),
            chats: HashMap::new(),
        }
    }

    /// Book the earliest slot open to `chat` (or to no chat in particular)
    /// and return how long until it starts.
    fn book(&mut self, chat: Option<ChatId>, cfg: &ThrottleConfig) -> Duration {
        let now = Instant::now();
        // A chat whose slot has passed is unconstrained; forget it.
        self.chats.retain(|_, next| *next > now);

        let global_start = self.global_next.max(now);
        self.global_next = global_start + cfg.global_min_interval;

        let start = match chat {
            Some(chat) => {
                let chat_start = self
                    .chats
                    .get(&chat)
                    .map_or(global_start, |next| (*next).max(global_start));
                self.chats
                    .insert(chat, chat_start + cfg.per_chat_min_interval);
                chat_start
            }
            None => global_start,
        };
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound calls.
///
/// A fan-out to many destinations otherwise bursts straight into Telegram's
/// flood limits (HTTP 429). Slots are booked under the lock and slept
/// outside it, so concurrent handlers queue in arrival order. Only chats with
/// a slot still in the future are remembered.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    schedule: Mutex<Schedule>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            schedule: Mutex::new(Schedule::new()),
        }
    }

    async fn wait_turn(&self, chat: Option<ChatId>) {
        let wait = self.schedule.lock().await.book(chat, &self.cfg);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn tracked_chats(&self) -> usize {
        self.schedule.lock().await.chats.len()
    }
}

#[async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn identity(&self) -> Result<String> {
        self.inner.identity().await
    }

    async fn send_text(&self, to: Recipient, text: &str) -> Result<MessageRef> {
        self.wait_turn(Some(to.address())).await;
        self.inner.send_text(to, text).await
    }

    async fn forward(&self, to: Recipient, message: MessageRef) -> Result<MessageRef> {
        self.wait_turn(Some(to.address())).await;
        self.inner.forward(to, message).await
    }

    async fn set_commands(&self, commands: &[BotCommand]) -> Result<()> {
        self.wait_turn(None).await;
        self.inner.set_commands(commands).await
    }
}
