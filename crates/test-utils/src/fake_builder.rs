use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::watch;
use tracing::debug;
use depbuild::exec::{BoxFuture, BuildRequest, Builder, BuilderRegistry};
use depbuild::types::BuildOutcome;

/// Builder kind under which [`FakeBuilds::registry`] registers the fake.
pub const FAKE_BUILDER: &str = "fake";

/// Shared script and call log for every [`FakeBuilder`] of one registry.
///
/// - modules listed via [`fail`](Self::fail) report a failed outcome
/// - modules listed via [`gate`](Self::gate) block until the gate is opened
/// - every build, stop and overlapping build is counted per module
#[derive(Default)]
pub struct FakeBuilds {
    delay: Mutex<Duration>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, watch::Sender<bool>>>,
    builds: Mutex<HashMap<String, usize>>,
    stops: Mutex<HashMap<String, usize>>,
    order: Mutex<Vec<String>>,
    in_flight: Mutex<HashMap<String, usize>>,
    overlaps: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeBuilds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry with the built-in kinds plus `fake`, all `fake` builders
    /// sharing `self`.
    pub fn registry(self: &Arc<Self>) -> BuilderRegistry {
        let mut registry = BuilderRegistry::with_noop_delay(Duration::from_millis(1));
        let shared = Arc::clone(self);
        registry.register(FAKE_BUILDER, move |module| {
            Ok(Arc::new(FakeBuilder {
                module: module.name.clone(),
                shared: Arc::clone(&shared),
            }) as Arc<dyn Builder>)
        });
        registry
    }

    /// How long each build takes once past its gate.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail(&self, module: &str) {
        self.failing.lock().unwrap().insert(module.to_string());
    }

    pub fn succeed(&self, module: &str) {
        self.failing.lock().unwrap().remove(module);
    }

    /// Make builds of `module` wait until [`open`](Self::open) is called.
    pub fn gate(&self, module: &str) {
        let (tx, _) = watch::channel(false);
        self.gates.lock().unwrap().insert(module.to_string(), tx);
    }

    /// Release every current and future build of `module`. Fails when the
    /// module was never gated, which usually means a typo in the test.
    pub fn open(&self, module: &str) -> Result<()> {
        let gates = self.gates.lock().unwrap();
        let tx = gates
            .get(module)
            .ok_or_else(|| anyhow!("module {module} has no gate"))?;
        tx.send_replace(true);
        Ok(())
    }

    pub fn builds(&self, module: &str) -> usize {
        self.builds.lock().unwrap().get(module).copied().unwrap_or(0)
    }

    pub fn stops(&self, module: &str) -> usize {
        self.stops.lock().unwrap().get(module).copied().unwrap_or(0)
    }

    /// Modules in the order their builds started.
    pub fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    /// Number of builds that started while another build of the same module
    /// was still running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Highest number of builds running at once, across modules.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn is_running(&self, module: &str) -> bool {
        self.in_flight.lock().unwrap().get(module).copied().unwrap_or(0) > 0
    }

    /// Poll until `module` has started at least `n` builds.
    pub async fn wait_for_builds(&self, module: &str, n: usize) {
        while self.builds(module) < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    fn gate_for(&self, module: &str) -> Option<watch::Receiver<bool>> {
        self.gates.lock().unwrap().get(module).map(|tx| tx.subscribe())
    }

    fn enter(self: &Arc<Self>, module: &str) -> InFlight {
        *self.builds.lock().unwrap().entry(module.to_string()).or_default() += 1;
        self.order.lock().unwrap().push(module.to_string());

        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(module.to_string()).or_default();
        if *count > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        *count += 1;

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        InFlight {
            module: module.to_string(),
            shared: Arc::clone(self),
        }
    }
}

/// Decrements the in-flight counters even when the build future is dropped.
struct InFlight {
    module: String,
    shared: Arc<FakeBuilds>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(count) = self.shared.in_flight.lock().unwrap().get_mut(&self.module) {
            *count = count.saturating_sub(1);
        }
        self.shared.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scriptable builder backed by [`FakeBuilds`].
pub struct FakeBuilder {
    module: String,
    shared: Arc<FakeBuilds>,
}

impl Builder for FakeBuilder {
    fn build(&self, request: BuildRequest) -> BoxFuture<'_, BuildOutcome> {
        let shared = Arc::clone(&self.shared);

        Box::pin(async move {
            let _guard = shared.enter(&request.module_name);
            debug!(module = %request.module_name, "fake build started");

            if let Some(mut gate) = shared.gate_for(&request.module_name) {
                let _ = gate.wait_for(|open| *open).await;
                debug!(module = %request.module_name, "fake build released");
            }

            let delay = *shared.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if shared.failing.lock().unwrap().contains(&request.module_name) {
                BuildOutcome::failure(format!("{} failed", request.module_name))
            } else if request.extra_args.is_empty() {
                BuildOutcome::success(format!("{} built", request.module_name))
            } else {
                BuildOutcome::success(format!(
                    "{} built with {}",
                    request.module_name, request.extra_args
                ))
            }
        })
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        debug!(module = %self.module, "fake build stopped");
        *self.shared.stops.lock().unwrap().entry(self.module.clone()).or_default() += 1;
        Box::pin(async {})
    }
}
