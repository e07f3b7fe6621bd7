// src/engine/executor.rs

//! Worker that claims one eligible node at a time and drives its builder.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::dag::{BuildStatus, InvariantViolation, NodeId};
use crate::engine::SessionEvent;
use crate::engine::state::SharedState;
use crate::exec::{BuildRequest, Builder};
use crate::types::BuildOutcome;

/// The build attempt a worker currently owns.
struct Attempt {
    node: NodeId,
    module: String,
    builder: Arc<dyn Builder>,
    /// Fires once `Builder::build` has been invoked inside the task.
    started: Option<oneshot::Receiver<()>>,
    handle: JoinHandle<BuildOutcome>,
}

/// What woke the worker up.
enum Wake {
    Tick,
    Finished(Result<BuildOutcome, JoinError>),
    Shutdown,
}

/// One member of the executor pool.
///
/// - When idle, it claims the first eligible node and starts its builder in
///   a separate task.
/// - When the build resolves, the outcome is applied only if the node is
///   still `BUILDING`; otherwise it is discarded.
/// - When the node was demoted while building, the builder is stopped and
///   the claim released.
/// - On shutdown, any in-flight build is stopped (and awaited) and the node
///   is put back to `WAITING`.
pub struct Executor {
    id: usize,
    state: SharedState,
    wake: Arc<Notify>,
    events: mpsc::Sender<SessionEvent>,
    tick: Duration,
    extra_args: String,
    current: Option<Attempt>,
}

impl Executor {
    pub fn new(
        id: usize,
        state: SharedState,
        wake: Arc<Notify>,
        events: mpsc::Sender<SessionEvent>,
        tick: Duration,
        extra_args: String,
    ) -> Self {
        Self {
            id,
            state,
            wake,
            events,
            tick,
            extra_args,
            current: None,
        }
    }

    /// Spawn the worker loop on the Tokio runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Worker loop. Returns once shutdown was requested and the in-flight
    /// build, if any, is fully stopped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = self.id, "executor started");

        if let Err(violation) = self.run_inner(&mut shutdown).await {
            warn!(worker = self.id, error = %violation, "executor hit an invariant violation");
            // Leave no builder behind even on the error path.
            if let Err(e) = self.stop().await {
                warn!(worker = self.id, error = %e, "second violation while stopping");
            }
            let _ = self.events.send(SessionEvent::Fatal(violation)).await;
        }

        info!(worker = self.id, "executor stopped");
    }

    async fn run_inner(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), InvariantViolation> {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                return self.stop().await;
            }

            let wake = tokio::select! {
                biased;
                changed = shutdown.changed() => match changed {
                    Ok(()) if !*shutdown.borrow() => Wake::Tick,
                    _ => Wake::Shutdown,
                },
                res = attempt_finished(&mut self.current) => Wake::Finished(res),
                _ = self.wake.notified() => Wake::Tick,
                _ = ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Shutdown => return self.stop().await,
                Wake::Finished(res) => {
                    self.conclude(res)?;
                    self.do_work().await?;
                }
                Wake::Tick => self.do_work().await?,
            }
        }
    }

    /// One tick of work: claim when idle, abort when the claimed node was
    /// demoted.
    async fn do_work(&mut self) -> Result<(), InvariantViolation> {
        match &self.current {
            None => self.try_claim(),
            Some(attempt) => {
                let status = self.state.lock().graph.node(attempt.node).status();
                if status != BuildStatus::Building {
                    self.abort(status).await;
                }
                Ok(())
            }
        }
    }

    fn try_claim(&mut self) -> Result<(), InvariantViolation> {
        let (node, request, builder) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(id) = state.queue.claim(&mut state.graph)? else {
                return Ok(());
            };
            let n = state.graph.node(id);
            let request = BuildRequest {
                module_name: n.module_name().to_string(),
                target_module_name: n.target_module_name().to_string(),
                extra_args: if n.is_target() {
                    self.extra_args.clone()
                } else {
                    String::new()
                },
            };
            (id, request, n.builder())
        };

        info!(worker = self.id, module = %request.module_name, "building module");

        let module = request.module_name.clone();
        let runner = Arc::clone(&builder);
        let (started_tx, started_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let build = runner.build(request);
            let _ = started_tx.send(());
            build.await
        });

        self.current = Some(Attempt {
            node,
            module,
            builder,
            started: Some(started_rx),
            handle,
        });
        Ok(())
    }

    /// Apply a finished build to its node, unless it was demoted meanwhile.
    fn conclude(&mut self, res: Result<BuildOutcome, JoinError>) -> Result<(), InvariantViolation> {
        let Some(attempt) = self.current.take() else {
            return Ok(());
        };

        let outcome = res.unwrap_or_else(|e| BuildOutcome::failure(format!("builder task failed: {e}")));

        {
            let mut state = self.state.lock();
            let node = state.graph.node_mut(attempt.node);
            if node.status() == BuildStatus::Building {
                let success = outcome.success;
                node.complete(outcome)?;
                if success {
                    info!(worker = self.id, module = %attempt.module, "module built");
                } else {
                    warn!(worker = self.id, module = %attempt.module, "module build failed");
                }
            } else {
                debug!(
                    worker = self.id,
                    module = %attempt.module,
                    status = %node.status(),
                    "discarding result of demoted build"
                );
            }
            state.queue.release(attempt.node);
        }

        let _ = self.events.try_send(SessionEvent::NodeSettled);
        Ok(())
    }

    /// Stop a build whose node is no longer `BUILDING` and drop the claim.
    async fn abort(&mut self, status: BuildStatus) {
        let Some(mut attempt) = self.current.take() else {
            return;
        };
        info!(
            worker = self.id,
            module = %attempt.module,
            %status,
            "aborting build: dependency invalidated"
        );

        halt(&mut attempt).await;
        attempt.handle.abort();
        let _ = attempt.handle.await;

        self.state.lock().queue.release(attempt.node);
        let _ = self.events.try_send(SessionEvent::NodeSettled);
    }

    /// Session shutdown: stop the in-flight build and leave its node
    /// `WAITING`.
    async fn stop(&mut self) -> Result<(), InvariantViolation> {
        let Some(mut attempt) = self.current.take() else {
            return Ok(());
        };
        info!(worker = self.id, module = %attempt.module, "stopping in-flight build");

        halt(&mut attempt).await;
        attempt.handle.abort();
        let _ = attempt.handle.await;

        let mut state = self.state.lock();
        let node = state.graph.node_mut(attempt.node);
        if node.status() == BuildStatus::Building {
            node.demote()?;
        }
        state.queue.release(attempt.node);
        Ok(())
    }
}

/// Ask the builder to stop and wait until it has.
///
/// The stop request is only issued once the build task has actually invoked
/// the builder, so a freshly spawned attempt cannot start its process after
/// `stop` already returned.
async fn halt(attempt: &mut Attempt) {
    if attempt.handle.is_finished() {
        return;
    }
    if let Some(started) = attempt.started.take() {
        // Err: the task ended before invoking the builder.
        if started.await.is_err() {
            return;
        }
    }
    attempt.builder.stop().await;
}

async fn attempt_finished(current: &mut Option<Attempt>) -> Result<BuildOutcome, JoinError> {
    match current {
        Some(attempt) => (&mut attempt.handle).await,
        None => std::future::pending().await,
    }
}
