//! Liveness endpoint: `GET /health` → 200 `OK`.

use std::{future::IntoFuture, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use axum::{http::header, response::IntoResponse, routing::get, Router};
use tokio_util::sync::CancellationToken;

use crate::{errors::Error, lifecycle::Service, Result};

/// How long in-flight requests get after shutdown before the listener is
/// dropped.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "OK")
}

pub struct HealthServer {
    addr: SocketAddr,
    grace: Duration,
}

impl HealthServer {
    /// Listen on every interface at `port`.
    pub fn new(port: u16) -> Self {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    pub fn bind(addr: SocketAddr) -> Self {
        Self {
            addr,
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl Service for HealthServer {
    fn name(&self) -> &'static str {
        "health server"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| {
                Error::service(self.name(), format!("cannot bind {}: {e}", self.addr))
            })?;
        tracing::info!(addr = %self.addr, "health server listening");

        let serve = axum::serve(listener, router())
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future();
        tokio::pin!(serve);

        let grace = self.grace;
        let deadline = async {
            shutdown.cancelled().await;
            tracing::info!("shutting down health server");
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            res = &mut serve => res.map_err(|e| Error::service(self.name(), e))?,
            () = deadline => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "health server drain timed out, closing"
                );
            }
        }

        Ok(())
    }
}
