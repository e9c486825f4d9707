//! Runs the long-lived services under one cancellation domain.
//!
//! `Idle → Running → ShuttingDown → Stopped`. Shutdown starts at most once,
//! from an OS signal, an explicit [`ShutdownHandle::trigger`], or the first
//! service that fails (or returns early). Every service is then drained
//! before [`Orchestrator::run`] returns.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{errors::Error, Result};

/// A long-running task owned by the orchestrator.
///
/// `run` must return once `shutdown` is cancelled (after its own bounded
/// drain). Returning earlier, with or without an error, is fatal for the
/// whole process.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Running,
    ShuttingDown,
    Stopped,
}

/// Why shutdown started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownCause {
    Signal,
    Requested,
    ServiceFailed(&'static str),
}

/// Single-fire shutdown trigger shared by everything that may stop the
/// process.
#[derive(Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl ShutdownHandle {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start shutdown. Returns `true` only for the call that actually started
    /// it; later calls are no-ops.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(?cause, "shutdown already in progress");
            return false;
        }
        tracing::info!(?cause, "shutting down");
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

pub struct Orchestrator {
    services: Vec<Arc<dyn Service>>,
    shutdown: ShutdownHandle,
    state: watch::Sender<LifecycleState>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            services: Vec::new(),
            shutdown: ShutdownHandle::new(),
            state,
        }
    }

    pub fn with_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LifecycleState) {
        tracing::info!(state = ?next, "lifecycle");
        self.state.send_replace(next);
    }

    /// Run every service until `signal` resolves, a shutdown is triggered, or
    /// a service fails. Returns the error that caused shutdown, if any, only
    /// after every service has stopped.
    pub async fn run<S>(self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let mut tasks = JoinSet::new();
        for service in &self.services {
            let service = service.clone();
            let token = self.shutdown.token();
            tasks.spawn(async move {
                let name = service.name();
                tracing::info!(service = name, "starting");
                (name, service.run(token).await)
            });
        }
        self.transition(LifecycleState::Running);

        let mut cause_error: Option<Error> = None;
        let cancelled = self.shutdown.token();
        tokio::pin!(signal);

        tokio::select! {
            biased;
            () = &mut signal => {
                self.shutdown.trigger(ShutdownCause::Signal);
            }
            () = cancelled.cancelled() => {}
            Some(joined) = tasks.join_next() => {
                let (name, err) = exit_error(joined);
                tracing::error!(service = name, error = %err, "service stopped unexpectedly");
                if self.shutdown.trigger(ShutdownCause::ServiceFailed(name)) {
                    cause_error = Some(err);
                }
            }
        }
        self.transition(LifecycleState::ShuttingDown);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => tracing::info!(service = name, "stopped"),
                Ok((name, Err(e))) => {
                    tracing::warn!(service = name, error = %e, "service failed while draining");
                }
                Err(e) => tracing::warn!(error = %e, "service task aborted while draining"),
            }
        }
        self.transition(LifecycleState::Stopped);

        match cause_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A service exit seen before shutdown was requested is always an error.
fn exit_error(
    joined: std::result::Result<(&'static str, Result<()>), tokio::task::JoinError>,
) -> (&'static str, Error) {
    match joined {
        Ok((name, Ok(()))) => (name, Error::service(name, "exited before shutdown was requested")),
        Ok((name, Err(e))) => (name, e),
        Err(e) => ("task", Error::service("task", e)),
    }
}

/// Resolves on SIGINT (ctrl-c) or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Waits for cancellation, then optionally fails.
    struct Idle {
        name: &'static str,
        stopped: Arc<AtomicUsize>,
        fail_on_drain: bool,
    }

    #[async_trait]
    impl Service for Idle {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.stopped.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_drain {
                return Err(Error::service(self.name, "drain failed"));
            }
            Ok(())
        }
    }

    /// Fails straight away.
    struct Broken;

    #[async_trait]
    impl Service for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn run(&self, _shutdown: CancellationToken) -> Result<()> {
            Err(Error::service("broken", "address in use"))
        }
    }

    /// Returns Ok without waiting for cancellation.
    struct Quitter;

    #[async_trait]
    impl Service for Quitter {
        fn name(&self) -> &'static str {
            "quitter"
        }

        async fn run(&self, _shutdown: CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    fn idle(name: &'static str, stopped: &Arc<AtomicUsize>) -> Arc<dyn Service> {
        Arc::new(Idle {
            name,
            stopped: stopped.clone(),
            fail_on_drain: false,
        })
    }

    #[tokio::test]
    async fn signal_drains_both_services_and_exits_cleanly() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let orch = Orchestrator::new()
            .with_service(idle("health", &stopped))
            .with_service(idle("poller", &stopped));
        let states = orch.subscribe();
        assert_eq!(*states.borrow(), LifecycleState::Idle);

        let result = orch.run(tokio::time::sleep(Duration::from_millis(10))).await;

        assert!(result.is_ok());
        assert_eq!(stopped.load(Ordering::SeqCst), 2);
        assert_eq!(*states.borrow(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn failing_service_stops_the_other_and_propagates() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let orch = Orchestrator::new()
            .with_service(idle("poller", &stopped))
            .with_service(Arc::new(Broken));

        let err = orch
            .run(std::future::pending::<()>())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("address in use"), "{err}");
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn early_clean_exit_is_fatal() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let orch = Orchestrator::new()
            .with_service(idle("health", &stopped))
            .with_service(Arc::new(Quitter));

        let err = orch.run(std::future::pending::<()>()).await.unwrap_err();

        assert!(matches!(err, Error::Service { service: "quitter", .. }));
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drain_errors_after_signal_are_not_propagated() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let orch = Orchestrator::new().with_service(Arc::new(Idle {
            name: "health",
            stopped: stopped.clone(),
            fail_on_drain: true,
        }));

        let result = orch.run(async {}).await;

        assert!(result.is_ok());
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_triggers_start_exactly_one_shutdown() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let orch = Orchestrator::new()
            .with_service(idle("health", &stopped))
            .with_service(idle("poller", &stopped));
        let handle = orch.shutdown_handle();

        let run = tokio::spawn(orch.run(std::future::pending::<()>()));

        let a = handle.clone();
        let b = handle.clone();
        let (first, second) = tokio::join!(
            tokio::spawn(async move { a.trigger(ShutdownCause::Signal) }),
            tokio::spawn(async move { b.trigger(ShutdownCause::Signal) }),
        );
        let fired = [first.unwrap(), second.unwrap()];
        assert_eq!(fired.iter().filter(|f| **f).count(), 1);
        assert!(!handle.trigger(ShutdownCause::Requested));

        assert!(run.await.unwrap().is_ok());
        assert!(handle.is_triggered());
        assert_eq!(stopped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn trigger_before_run_still_drains() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let orch = Orchestrator::new().with_service(idle("health", &stopped));
        orch.shutdown_handle().trigger(ShutdownCause::Requested);

        assert!(orch.run(std::future::pending::<()>()).await.is_ok());
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }
}
