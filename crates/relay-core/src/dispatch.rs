//! Handlers behind the routing table.
//!
//! Handlers never fail the inbound pipeline: an ineligible event is ignored
//! and downstream forward failures stay inside the [`ForwardReport`].

use std::sync::Arc;

use crate::{
    config::Config,
    domain::{ChatId, MessageRef, Recipient},
    forward::{ForwardEngine, ForwardReport},
    messaging::{port::MessagingPort, types::InboundEvent},
    routing::{Route, RoutingTable},
};

/// What a handler did with an event.
#[derive(Debug)]
pub enum HandleOutcome {
    /// No binding, or the bound handler found the event ineligible.
    Ignored,
    /// `/id` answered (the reply itself may have failed; it is logged).
    Replied,
    Forwarded(ForwardReport),
}

impl HandleOutcome {
    pub fn forward_attempts(&self) -> usize {
        match self {
            Self::Forwarded(report) => report.attempted(),
            _ => 0,
        }
    }
}

pub struct Dispatcher {
    cfg: Arc<Config>,
    routes: Arc<RoutingTable>,
    messenger: Arc<dyn MessagingPort>,
    forwarder: ForwardEngine,
}

impl Dispatcher {
    pub fn new(
        cfg: Arc<Config>,
        routes: Arc<RoutingTable>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let forwarder = ForwardEngine::new(messenger.clone());
        Self {
            cfg,
            routes,
            messenger,
            forwarder,
        }
    }

    pub async fn handle(&self, event: &InboundEvent) -> HandleOutcome {
        match self.routes.resolve(event) {
            Some(Route::Id) => self.handle_id(event).await,
            Some(Route::Resend) => self.handle_resend(event).await,
            Some(Route::Feedback) => self.handle_feedback(event).await,
            None => HandleOutcome::Ignored,
        }
    }

    async fn handle_id(&self, event: &InboundEvent) -> HandleOutcome {
        tracing::info!(chat = %event.chat_id, "received /id command");
        let reply = event.chat_id.0.to_string();
        if let Err(e) = self
            .messenger
            .send_text(Recipient::new(event.chat_id), &reply)
            .await
        {
            tracing::warn!(chat = %event.chat_id, error = %e, "failed to answer /id");
        }
        HandleOutcome::Replied
    }

    async fn handle_resend(&self, event: &InboundEvent) -> HandleOutcome {
        let Some(rule) = &self.cfg.resend else {
            return HandleOutcome::Ignored;
        };
        tracing::info!(chat = %event.chat_id, "received resend request");

        let Some(target) = event.reply_to else {
            return HandleOutcome::Ignored;
        };
        if !rule.from.contains(&event.chat_id) {
            tracing::debug!(chat = %event.chat_id, "resend from unauthorized chat ignored");
            return HandleOutcome::Ignored;
        }

        HandleOutcome::Forwarded(self.fan_out(&rule.to, target).await)
    }

    async fn handle_feedback(&self, event: &InboundEvent) -> HandleOutcome {
        let Some(rule) = &self.cfg.feedback else {
            return HandleOutcome::Ignored;
        };
        if !event.chat_kind.is_private() {
            return HandleOutcome::Ignored;
        }
        tracing::info!(chat = %event.chat_id, "received feedback from private chat");

        HandleOutcome::Forwarded(self.fan_out(&rule.to, event.message).await)
    }

    async fn fan_out(&self, to: &[ChatId], message: MessageRef) -> ForwardReport {
        let recipients: Vec<Recipient> = to.iter().copied().map(Recipient::new).collect();
        self.forwarder.forward(&recipients, message).await
    }
}

/// Publish the command menu once. Failure leaves the bot usable, so it is
/// only logged.
pub async fn publish_commands(routes: &RoutingTable, messenger: &dyn MessagingPort) -> bool {
    match messenger.set_commands(routes.menu()).await {
        Ok(()) => {
            tracing::info!(count = routes.menu().len(), "published command menu");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to set commands");
            false
        }
    }
}
