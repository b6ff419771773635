use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::error::AppError;
use crate::models::Snapshot;
use crate::registry::SharedRegistry;
use crate::traits::{Extractor, Fetcher};

/// What caused an engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Periodic,
}

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<'a> {
    Started { interval: Duration },
    RunStarted { trigger: Trigger, sources: usize },
    RunCompleted { trigger: Trigger, snapshot: &'a Snapshot },
    RunSkipped,
    PublishFailed { timestamp: &'a str },
    Stopping,
    Stopped,
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait SchedulerReporter: Send + Sync + 'static {
    fn report(&self, event: SchedulerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl SchedulerReporter for TracingReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        match event {
            SchedulerEvent::Started { interval } => {
                tracing::info!(interval_secs = interval.as_secs_f64(), "Periodic extraction started");
            }
            SchedulerEvent::RunStarted { trigger, sources } => {
                tracing::info!(?trigger, %sources, "Extraction started");
            }
            SchedulerEvent::RunCompleted { trigger, snapshot } => {
                tracing::info!(
                    ?trigger,
                    timestamp = %snapshot.timestamp,
                    sources = snapshot.outcomes.len(),
                    failed = snapshot.failed_count(),
                    "Extraction completed"
                );
            }
            SchedulerEvent::RunSkipped => {
                tracing::warn!("Nothing tracked, skipping periodic extraction");
            }
            SchedulerEvent::PublishFailed { timestamp } => {
                tracing::warn!(%timestamp, "Snapshot receiver is gone");
            }
            SchedulerEvent::Stopping => {
                tracing::info!("Periodic extraction stopping");
            }
            SchedulerEvent::Stopped => {
                tracing::info!("Periodic extraction stopped");
            }
        }
    }
}

struct PeriodicLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the [`Engine`] once on demand or repeatedly at a fixed interval.
///
/// Every snapshot, manual or periodic, is published on the channel returned
/// by [`Scheduler::new`]. The channel is unbounded: a caller that never
/// drains the receiver keeps every published snapshot in memory until the
/// receiver is dropped.
///
/// At most one periodic loop exists at a time. A stopped loop counts until
/// its in-flight invocation has finished.
pub struct Scheduler<F, X, R = TracingReporter>
where
    F: Fetcher,
    X: Extractor,
    R: SchedulerReporter,
{
    engine: Arc<Engine<F, X>>,
    registry: SharedRegistry,
    publisher: mpsc::UnboundedSender<Snapshot>,
    reporter: Arc<R>,
    periodic: Option<PeriodicLoop>,
}

impl<F, X> Scheduler<F, X, TracingReporter>
where
    F: Fetcher,
    X: Extractor,
{
    pub fn new(
        engine: Engine<F, X>,
        registry: SharedRegistry,
    ) -> (Self, mpsc::UnboundedReceiver<Snapshot>) {
        Self::with_reporter(engine, registry, TracingReporter)
    }
}

impl<F, X, R> Scheduler<F, X, R>
where
    F: Fetcher,
    X: Extractor,
    R: SchedulerReporter,
{
    pub fn with_reporter(
        engine: Engine<F, X>,
        registry: SharedRegistry,
        reporter: R,
    ) -> (Self, mpsc::UnboundedReceiver<Snapshot>) {
        let (publisher, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            engine: Arc::new(engine),
            registry,
            publisher,
            reporter: Arc::new(reporter),
            periodic: None,
        };
        (scheduler, receiver)
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.periodic
            .as_ref()
            .is_some_and(|p| !p.cancel.is_cancelled() && !p.handle.is_finished())
    }

    /// Whether a loop task is still alive, including one that was stopped
    /// and is finishing its last invocation.
    fn loop_alive(&self) -> bool {
        self.periodic.as_ref().is_some_and(|p| !p.handle.is_finished())
    }

    /// Start the periodic loop.
    ///
    /// Returns `Ok(false)` without doing anything if a loop is already
    /// running, or if a stopped loop is still finishing its in-flight
    /// invocation (await [`shutdown`](Self::shutdown) first to restart
    /// right away). Fails if nothing is tracked or `interval` is zero.
    pub fn start(&mut self, interval: Duration) -> Result<bool, AppError> {
        if self.loop_alive() {
            return Ok(false);
        }
        if self.registry.is_empty() {
            return Err(AppError::EmptyRegistry);
        }
        if interval.is_zero() {
            return Err(AppError::InvalidInterval(interval));
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(periodic_loop(
            Arc::clone(&self.engine),
            self.registry.clone(),
            self.publisher.clone(),
            Arc::clone(&self.reporter),
            interval,
            cancel.clone(),
        ));

        self.reporter.report(SchedulerEvent::Started { interval });
        self.periodic = Some(PeriodicLoop { cancel, handle });
        Ok(true)
    }

    /// Ask the periodic loop to exit. An invocation already in flight
    /// completes and is published; no further one starts.
    ///
    /// Returns whether a loop was running.
    /// The loop handle is kept so a later [`shutdown`](Self::shutdown) can
    /// wait for it.
    pub fn stop(&mut self) -> bool {
        let running = self.is_running();
        if let Some(periodic) = &self.periodic {
            if !periodic.cancel.is_cancelled() {
                self.reporter.report(SchedulerEvent::Stopping);
            }
            periodic.cancel.cancel();
        }
        running
    }

    /// [`stop`](Self::stop), then wait for the loop to finish. Also waits
    /// for a loop that an earlier `stop` left draining.
    pub async fn shutdown(&mut self) {
        if let Some(periodic) = self.periodic.take() {
            if !periodic.cancel.is_cancelled() {
                self.reporter.report(SchedulerEvent::Stopping);
            }
            periodic.cancel.cancel();
            if let Err(e) = periodic.handle.await {
                tracing::error!(error = %e, "Periodic extraction task failed");
            }
        }
    }

    /// Run the engine once, regardless of the periodic loop.
    pub async fn manual_run(&self) -> Result<Snapshot, AppError> {
        let view = self.registry.view();
        if view.is_empty() {
            return Err(AppError::EmptyRegistry);
        }

        self.reporter.report(SchedulerEvent::RunStarted {
            trigger: Trigger::Manual,
            sources: view.len(),
        });
        let snapshot = self.engine.run(view).await;
        self.reporter.report(SchedulerEvent::RunCompleted {
            trigger: Trigger::Manual,
            snapshot: &snapshot,
        });

        if self.publisher.send(snapshot.clone()).is_err() {
            self.reporter.report(SchedulerEvent::PublishFailed {
                timestamp: &snapshot.timestamp,
            });
        }
        Ok(snapshot)
    }
}

impl<F, X, R> Drop for Scheduler<F, X, R>
where
    F: Fetcher,
    X: Extractor,
    R: SchedulerReporter,
{
    fn drop(&mut self) {
        if let Some(periodic) = self.periodic.take() {
            periodic.cancel.cancel();
        }
    }
}

async fn periodic_loop<F, X, R>(
    engine: Arc<Engine<F, X>>,
    registry: SharedRegistry,
    publisher: mpsc::UnboundedSender<Snapshot>,
    reporter: Arc<R>,
    interval: Duration,
    cancel: CancellationToken,
) where
    F: Fetcher,
    X: Extractor,
    R: SchedulerReporter,
{
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let view = registry.view();
        if view.is_empty() {
            reporter.report(SchedulerEvent::RunSkipped);
        } else {
            reporter.report(SchedulerEvent::RunStarted {
                trigger: Trigger::Periodic,
                sources: view.len(),
            });
            let snapshot = engine.run(view).await;
            reporter.report(SchedulerEvent::RunCompleted {
                trigger: Trigger::Periodic,
                snapshot: &snapshot,
            });

            let timestamp = snapshot.timestamp.clone();
            if publisher.send(snapshot).is_err() {
                reporter.report(SchedulerEvent::PublishFailed {
                    timestamp: &timestamp,
                });
                break;
            }
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = cancel.cancelled() => break,
        }
    }

    reporter.report(SchedulerEvent::Stopped);
}
