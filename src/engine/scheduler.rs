// src/engine/scheduler.rs

use std::sync::Arc;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::dag::{BuildGraph, BuildStatus, InvariantViolation};
use crate::engine::executor::Executor;
use crate::engine::reconcile::reconcile;
use crate::engine::state::{BuildReport, NodeReport, SharedState};
use crate::engine::{SessionEvent, SessionOptions};
use crate::errors::{DepbuildError, Result};
use crate::types::Verdict;

/// Owns the reconciliation loop and the pass/fail verdict of a session.
#[derive(Debug, Clone)]
pub struct BuildScheduler {
    options: SessionOptions,
}

impl BuildScheduler {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Build `graph` to completion.
    pub async fn schedule(&self, graph: BuildGraph) -> Result<BuildReport> {
        self.prepare(graph).run().await
    }

    /// Set up a session without starting it, so callers can grab a
    /// [`SessionHandle`] first.
    pub fn prepare(&self, graph: BuildGraph) -> BuildSession {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (shutdown_tx, _) = watch::channel(false);

        BuildSession {
            options: self.options.clone(),
            state: SharedState::new(graph),
            wake: Arc::new(Notify::new()),
            events_tx,
            events_rx,
            shutdown: Arc::new(shutdown_tx),
        }
    }
}

/// A prepared build session for one target.
#[derive(Debug)]
pub struct BuildSession {
    options: SessionOptions,
    state: SharedState,
    wake: Arc<Notify>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl BuildSession {
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: self.state.clone(),
            events: self.events_tx.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Start the executor pool, reconcile until the target settles (or the
    /// session is cancelled), then stop every executor.
    pub async fn run(mut self) -> Result<BuildReport> {
        let workers = self.options.workers.max(1);
        info!(
            module = %self.state.lock().graph.target_node().module_name(),
            workers,
            tick_ms = self.options.tick.as_millis() as u64,
            "build session started"
        );

        let executors = self.start_executors(workers);
        let outcome = self.reconcile_loop().await;
        let late = self.stop_executors(executors).await;

        // A violation raised while executors were stopping still fails the
        // session.
        let verdict = match (outcome, late) {
            (Err(e), _) => return Err(e),
            (Ok(_), Some(violation)) => return Err(violation.into()),
            (Ok(verdict), None) => verdict,
        };

        let report = self.state.lock().report(verdict);
        info!(module = %report.target, %verdict, "build session finished");
        Ok(report)
    }

    fn start_executors(&self, workers: usize) -> Vec<JoinHandle<()>> {
        (0..workers)
            .map(|id| {
                Executor::new(
                    id,
                    self.state.clone(),
                    Arc::clone(&self.wake),
                    self.events_tx.clone(),
                    self.options.tick,
                    self.options.extra_args.clone(),
                )
                .spawn(self.shutdown.subscribe())
            })
            .collect()
    }

    /// Signal shutdown and join every executor, keeping the event channel
    /// drained so no executor blocks on a full channel.
    async fn stop_executors(&mut self, executors: Vec<JoinHandle<()>>) -> Option<InvariantViolation> {
        self.shutdown.send_replace(true);
        let mut fatal = None;

        for mut handle in executors {
            loop {
                tokio::select! {
                    joined = &mut handle => {
                        if let Err(e) = joined {
                            warn!(error = %e, "executor task ended abnormally");
                        }
                        break;
                    }
                    Some(event) = self.events_rx.recv() => {
                        if let SessionEvent::Fatal(violation) = event {
                            fatal.get_or_insert(violation);
                        }
                    }
                }
            }
        }

        while let Ok(event) = self.events_rx.try_recv() {
            if let SessionEvent::Fatal(violation) = event {
                fatal.get_or_insert(violation);
            }
        }
        debug!("all executors stopped");
        fatal
    }

    async fn reconcile_loop(&mut self) -> Result<Verdict> {
        let mut ticker = interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow() {
                info!("session cancelled");
                return Ok(Verdict::Cancelled);
            }

            let step = {
                let mut state = self.state.lock();
                reconcile(&mut state)?
            };
            if let Some(verdict) = step.verdict {
                return Ok(verdict);
            }
            self.wake.notify_waiters();

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(Verdict::Cancelled);
                    }
                }
                event = self.events_rx.recv() => match event {
                    Some(SessionEvent::Fatal(violation)) => {
                        return Err(DepbuildError::InvariantViolation(violation));
                    }
                    Some(event) => debug!(?event, "scheduler woken"),
                    None => {}
                },
                _ = ticker.tick() => {}
            }
        }
    }
}

/// Cloneable control surface of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: SharedState,
    events: mpsc::Sender<SessionEvent>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Force `module` back to `WAITING`. Its dependents follow on the next
    /// reconciliation and everything is rebuilt once it succeeds again.
    pub fn invalidate(&self, module: &str) -> Result<()> {
        if self.state.lock().invalidate(module)? {
            let _ = self.events.try_send(SessionEvent::Invalidated(module.to_string()));
        }
        Ok(())
    }

    /// Cancel the session. In-flight builds are stopped and their nodes
    /// left `WAITING`.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn status_of(&self, module: &str) -> Option<BuildStatus> {
        self.state.lock().status_of(module)
    }

    /// Current status of every node.
    pub fn snapshot(&self) -> Vec<NodeReport> {
        self.state.lock().node_reports()
    }
}
