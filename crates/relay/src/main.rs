use std::sync::Arc;

use relay_core::{
    config::Config,
    dispatch::{publish_commands, Dispatcher},
    health::HealthServer,
    lifecycle::{shutdown_signal, Orchestrator},
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    routing::RoutingTable,
};
use relay_telegram::{router::TelegramReceiver, Bot, TelegramMessenger};

#[tokio::main]
async fn main() -> Result<(), relay_core::Error> {
    relay_core::logging::init("relay")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        port = cfg.port,
        resend = cfg.resend_enabled(),
        feedback = cfg.feedback_enabled(),
        "config loaded"
    );

    let bot = Bot::new(cfg.token.clone());
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let username = raw_messenger.identity().await.map_err(|e| {
        relay_core::Error::Config(format!("failed to initialize bot: {e}"))
    })?;
    tracing::info!(bot = %username, "authorized");

    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let routes = Arc::new(RoutingTable::from_config(&cfg, &username));
    let relay = Arc::new(Dispatcher::new(cfg.clone(), routes.clone(), messenger.clone()));
    publish_commands(&routes, messenger.as_ref()).await;

    Orchestrator::new()
        .with_service(Arc::new(HealthServer::new(cfg.port)))
        .with_service(Arc::new(TelegramReceiver::new(bot, relay)))
        .run(shutdown_signal())
        .await?;

    tracing::info!("relay stopped");
    Ok(())
}
