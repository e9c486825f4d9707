use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    update_listeners::Polling,
};
use tokio_util::sync::CancellationToken;

use relay_core::{
    dispatch::Dispatcher as RelayDispatcher, errors::Error, lifecycle::Service, Result,
};

use crate::handlers;

/// Long-poll wait per `getUpdates` request.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

const STOP_RETRY_INTERVAL: Duration = Duration::from_millis(50);
const STOP_ATTEMPTS: usize = 200;

/// The inbound receive loop, run as a lifecycle service.
///
/// The routing table is already built when this is constructed, so no update
/// is ever seen without its handlers in place.
pub struct TelegramReceiver {
    bot: Bot,
    relay: Arc<RelayDispatcher>,
}

impl TelegramReceiver {
    pub fn new(bot: Bot, relay: Arc<RelayDispatcher>) -> Self {
        Self { bot, relay }
    }
}

#[async_trait]
impl Service for TelegramReceiver {
    fn name(&self) -> &'static str {
        "telegram receive loop"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let handler = Update::filter_message().endpoint(handlers::handle_message);

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.relay.clone()])
            .default_handler(|_| async {})
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error from a message handler",
            ))
            .build();
        let stop = dispatcher.shutdown_token();

        let listener = Polling::builder(self.bot.clone())
            .timeout(POLL_TIMEOUT)
            .build();

        tracing::info!(
            poll_timeout_secs = POLL_TIMEOUT.as_secs(),
            "starting telegram receive loop"
        );
        let dispatch = dispatcher.dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        );
        tokio::pin!(dispatch);

        tokio::select! {
            biased;
            () = &mut dispatch => {
                return Err(Error::service(self.name(), "dispatcher stopped on its own"));
            }
            () = shutdown.cancelled() => {}
        }

        tracing::info!("stopping telegram receive loop");
        let stopping = async {
            if !request_stop(&stop).await {
                tracing::warn!("dispatcher never accepted shutdown, abandoning it");
            }
        };
        tokio::select! {
            biased;
            () = &mut dispatch => {}
            () = stopping => {}
        }

        Ok(())
    }
}

/// Ask the dispatcher to stop and wait until it has. The dispatcher refuses
/// while it is still starting up, so keep asking for a bounded time.
async fn request_stop(stop: &ShutdownToken) -> bool {
    for _ in 0..STOP_ATTEMPTS {
        match stop.shutdown() {
            Ok(done) => {
                done.await;
                return true;
            }
            Err(_) => tokio::time::sleep(STOP_RETRY_INTERVAL).await,
        }
    }
    false
}
