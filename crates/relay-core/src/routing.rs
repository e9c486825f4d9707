//! Trigger → handler bindings derived once from the validated config.

use std::collections::HashMap;

use crate::{
    config::Config,
    messaging::types::{parse_command, BotCommand, EventKind, InboundEvent},
};

pub const ID_COMMAND: &str = "/id";
pub const ID_DESCRIPTION: &str = "Get ID of this chat";

/// Handler a trigger is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Reply with the chat's own id.
    Id,
    /// Forward the replied-to message to the resend destinations.
    Resend,
    /// Forward the event's own message to the feedback destinations.
    Feedback,
}

/// Immutable after construction; shared freely across handler invocations.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    /// Username commands must be addressed to when they carry `@botname`.
    bot: String,
    commands: HashMap<String, Route>,
    keywords: HashMap<String, Route>,
    on_text: Option<Route>,
    on_photo: Option<Route>,
    menu: Vec<BotCommand>,
}

impl RoutingTable {
    pub fn from_config(cfg: &Config, bot_username: &str) -> Self {
        let mut table = Self {
            bot: bot_username.to_string(),
            ..Self::default()
        };

        table.bind(ID_COMMAND, Route::Id);
        table.menu.push(BotCommand::new(ID_COMMAND, ID_DESCRIPTION));

        if let Some(resend) = &cfg.resend {
            tracing::info!(trigger = %resend.trigger.text, "enabling resend");
            table.bind(&resend.trigger.text, Route::Resend);
            for keyword in &resend.keywords {
                table.bind(keyword, Route::Resend);
            }
            table.menu.push(BotCommand::new(
                &resend.trigger.text,
                resend.trigger.description.clone(),
            ));
        }

        if cfg.feedback.is_some() {
            tracing::info!("enabling feedback");
            table.on_text = Some(Route::Feedback);
            table.on_photo = Some(Route::Feedback);
        }

        table
    }

    /// Later bindings for the same trigger replace earlier ones. Only a
    /// single `/word` is a command; anything else matches as whole text.
    fn bind(&mut self, trigger: &str, route: Route) {
        if trigger.starts_with('/') && !trigger.contains(char::is_whitespace) {
            self.commands.insert(trigger.to_string(), route);
        } else {
            self.keywords.insert(trigger.to_string(), route);
        }
    }

    /// Pick the handler for an event: command, then exact keyword, then the
    /// catch-all for the event's kind. Commands addressed to another bot
    /// are not ours to answer at all.
    pub fn resolve(&self, event: &InboundEvent) -> Option<Route> {
        match &event.kind {
            EventKind::Text(text) => {
                if let Some(command) = parse_command(text) {
                    if !command.is_for(&self.bot) {
                        return None;
                    }
                    if let Some(route) = self.commands.get(command.name) {
                        return Some(*route);
                    }
                }
                if let Some(route) = self.keywords.get(text.as_str()) {
                    return Some(*route);
                }
                self.on_text
            }
            EventKind::Photo => self.on_photo,
            EventKind::Other => None,
        }
    }

    /// Commands to publish to the platform's menu.
    pub fn menu(&self) -> &[BotCommand] {
        &self.menu
    }
}
