// src/exec/noop.rs

use std::time::Duration;

use tracing::debug;

use crate::exec::builder::{BoxFuture, BuildRequest, Builder};
use crate::types::BuildOutcome;

/// Builder that does nothing but wait.
///
/// The wait is `per_char_delay` times the length of the module name. Modules
/// whose name contains `error` fail, which makes it handy for trying out
/// failure propagation from a manifest alone.
#[derive(Debug, Clone)]
pub struct NoopBuilder {
    per_char_delay: Duration,
}

impl NoopBuilder {
    pub fn new(per_char_delay: Duration) -> Self {
        Self { per_char_delay }
    }
}

impl Default for NoopBuilder {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl Builder for NoopBuilder {
    fn build(&self, request: BuildRequest) -> BoxFuture<'_, BuildOutcome> {
        let delay = self.per_char_delay * request.module_name.len() as u32;

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            debug!(module = %request.module_name, ?delay, "noop build finished");

            if request.module_name.contains("error") {
                BuildOutcome::failure("Big problem!!!")
            } else if request.is_target() {
                BuildOutcome::success("Good. This is me !")
            } else {
                BuildOutcome::success("Good.")
            }
        })
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        // Nothing to tear down: dropping the build future cancels the sleep.
        Box::pin(async {})
    }
}
