// Run Controller - starts runs on the tokio runtime and relays their events
//
// The orchestrator is synchronous and runs on a blocking worker. A supervising
// async task waits for it while emitting stall timer ticks, so callers only
// ever deal with the event stream and a join handle.

use crate::metrics::RunMetrics;
use crate::models::RunConfig;
use crate::services::{Orchestrator, RunReport, StopSignal};
use crate::state::{StateChange, StateManager};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Interval between stall timer ticks
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Starts and stops runs.
///
/// Only one run is active at a time; the ledger behind a run is never shared
/// between walkers.
///
/// # Example
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let controller = RunController::new(Arc::new(StateManager::new()), runtime.handle().clone());
///
/// let mut run = controller.start(config)?;
/// while let Some(event) = runtime.block_on(run.next_event()) {
///     println!("{event:?}");
/// }
/// let report = runtime.block_on(run.wait())?;
/// ```
pub struct RunController {
    state_manager: Arc<StateManager>,

    tokio_handle: tokio::runtime::Handle,

    /// Cancellation sender; `true` requests the active run to stop
    cancel_tx: watch::Sender<bool>,

    active: Arc<AtomicBool>,
}

impl RunController {
    pub fn new(state_manager: Arc<StateManager>, tokio_handle: tokio::runtime::Handle) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            state_manager,
            tokio_handle,
            cancel_tx,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a run of `config` with the system trash and audio probe.
    pub fn start(&self, config: RunConfig) -> Result<RunHandle> {
        let metrics = Arc::new(RunMetrics::new());
        let orchestrator = Orchestrator::new(Arc::clone(&self.state_manager), Arc::clone(&metrics));
        self.start_with(orchestrator, metrics, config)
    }

    /// Start a run driven by an already configured orchestrator.
    pub fn start_with(
        &self,
        orchestrator: Orchestrator,
        metrics: Arc<RunMetrics>,
        config: RunConfig,
    ) -> Result<RunHandle> {
        if self.active.swap(true, Ordering::SeqCst) {
            bail!("A run is already in progress");
        }

        self.cancel_tx.send_replace(false);
        let stop = StopSignal::from_receiver(self.cancel_tx.subscribe());
        let events = self.state_manager.subscribe();
        let (done_tx, done_rx) = watch::channel(false);

        let state = Arc::clone(&self.state_manager);
        let active = Arc::clone(&self.active);

        let task = self.tokio_handle.spawn(async move {
            let mut run = tokio::task::spawn_blocking(move || orchestrator.run(config, &stop));
            let mut ticker = tokio::time::interval(TICK_INTERVAL);

            let outcome = loop {
                tokio::select! {
                    result = &mut run => break result,
                    _ = ticker.tick() => {
                        state.stall_tick();
                    }
                }
            };

            active.store(false, Ordering::SeqCst);
            let _ = done_tx.send(true);

            match outcome.context("Run task panicked")? {
                Ok(report) => Ok(report),
                Err(e) => {
                    tracing::error!("Run aborted: {}", e);
                    Err(e.into())
                }
            }
        });

        tracing::info!("Run started");
        Ok(RunHandle {
            events,
            done: done_rx,
            finished: false,
            metrics,
            task,
        })
    }

    /// Request the active run to stop.
    ///
    /// The run observes the request at its next loop iteration, writes the
    /// status of the current folder and ends.
    pub fn stop(&self) {
        tracing::info!("Stop requested");
        self.cancel_tx.send_replace(true);
        self.state_manager.request_stop();
    }
}

/// Event stream and completion of one started run
pub struct RunHandle {
    events: broadcast::Receiver<StateChange>,
    done: watch::Receiver<bool>,
    finished: bool,
    metrics: Arc<RunMetrics>,
    task: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    /// Next event of the run, or `None` once the run has ended and every
    /// event it produced has been delivered.
    pub async fn next_event(&mut self) -> Option<StateChange> {
        loop {
            match self.events.try_recv() {
                Ok(change) => return Some(change),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream lagged, {} events skipped", skipped);
                    continue;
                }
                Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Empty) => {}
            }

            if self.finished {
                return None;
            }

            tokio::select! {
                event = self.events.recv() => match event {
                    Ok(change) => return Some(change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream lagged, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                },
                changed = self.done.changed() => {
                    if changed.is_err() || *self.done.borrow() {
                        self.finished = true;
                    }
                }
            }
        }
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    /// Wait for the run to end and return its report.
    pub async fn wait(self) -> Result<RunReport> {
        self.task.await.context("Run supervisor failed")?
    }
}
