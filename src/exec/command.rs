// src/exec/command.rs

//! Process-backed builder.

use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::exec::builder::{BoxFuture, BuildRequest, Builder};
use crate::types::BuildOutcome;

/// Handles for the process currently owned by a [`CommandBuilder`].
struct RunningBuild {
    /// Fired by `stop` to kill the child.
    cancel: oneshot::Sender<()>,
    /// Resolves (with an error) once the build future is gone.
    exited: oneshot::Receiver<()>,
}

/// Runs a shell command template per module.
///
/// `{module}` and `{target}` in the template are replaced by the module and
/// session target names. Extra arguments are appended only when building
/// the target itself. Success captures stdout as the detail, failure
/// captures stderr.
pub struct CommandBuilder {
    template: String,
    running: Mutex<Option<RunningBuild>>,
}

impl CommandBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            running: Mutex::new(None),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Final command line for a request.
    pub fn render(&self, request: &BuildRequest) -> String {
        let mut cmd = self
            .template
            .replace("{module}", &request.module_name)
            .replace("{target}", &request.target_module_name);
        if request.is_target() && !request.extra_args.trim().is_empty() {
            cmd.push(' ');
            cmd.push_str(request.extra_args.trim());
        }
        cmd
    }

    fn running(&self) -> MutexGuard<'_, Option<RunningBuild>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Builder for CommandBuilder {
    fn build(&self, request: BuildRequest) -> BoxFuture<'_, BuildOutcome> {
        let cmd = self.render(&request);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let (exited_tx, exited_rx) = oneshot::channel::<()>();

        *self.running() = Some(RunningBuild {
            cancel: cancel_tx,
            exited: exited_rx,
        });

        Box::pin(async move {
            let outcome = match run_command(&request.module_name, &cmd, cancel_rx).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(module = %request.module_name, error = %err, "builder process error");
                    BuildOutcome::failure(format!("{err:#}"))
                }
            };
            // A concurrent `stop` may have taken the slot already.
            self.running().take();
            drop(exited_tx);
            outcome
        })
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        let running = self.running().take();

        Box::pin(async move {
            let Some(running) = running else {
                return;
            };
            if running.cancel.send(()).is_err() {
                debug!("builder process already finished while stopping");
            }
            // Err means the sender was dropped, i.e. the build future ended.
            let _ = running.exited.await;
        })
    }
}

/// Run one command to completion, or until `cancel_rx` fires.
async fn run_command(
    module: &str,
    cmd: &str,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<BuildOutcome> {
    info!(module = %module, cmd = %cmd, "starting builder process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning builder process for module '{module}'"))?;

    let stdout = child.stdout.take().map(|s| collect_lines(module, "stdout", s));
    let stderr = child.stderr.take().map(|s| collect_lines(module, "stderr", s));

    tokio::select! {
        status = child.wait() => {
            let status = status
                .with_context(|| format!("waiting for builder process of module '{module}'"))?;
            let stdout = join_output(stdout).await;
            let stderr = join_output(stderr).await;

            info!(
                module = %module,
                exit_code = status.code().unwrap_or(-1),
                success = status.success(),
                "builder process exited"
            );

            if status.success() {
                Ok(BuildOutcome::success(stdout))
            } else {
                Ok(BuildOutcome::failure(stderr))
            }
        }

        cancel = &mut cancel_rx => {
            if cancel.is_ok() {
                info!(module = %module, "stop requested; killing builder process");
            }
            if let Err(e) = child.kill().await {
                warn!(module = %module, error = %e, "failed to kill builder process");
            }
            Ok(BuildOutcome::failure("build stopped"))
        }
    }
}

fn collect_lines<R>(module: &str, stream: &'static str, reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let module = module.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut out = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(module = %module, stream, "{}", line);
            out.push_str(&line);
            out.push('\n');
        }
        out
    })
}

async fn join_output(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(h) => h.await.unwrap_or_default(),
        None => String::new(),
    }
}
