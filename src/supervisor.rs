use std::{path::Path, process::Stdio};

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::{
    backend::{BackingService, OllamaClient},
    config::AppConfig,
    error::BootstrapError,
    model::{ReconcileReport, load_desired},
    readiness::{self, Readiness},
    reconcile::reconcile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    WaitingReady,
    Reconciling,
    HandoffToForeground,
    TimedOut,
    Aborted,
}

/// What happened once the backing service ran in the foreground.
#[derive(Debug)]
pub struct Completion {
    pub report: Option<ReconcileReport>,
    pub exit_code: u8,
}

/// Owns the backing service process from spawn until it exits.
pub struct Supervisor {
    config: AppConfig,
    client: OllamaClient,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(config: AppConfig) -> Result<Self, BootstrapError> {
        let client = OllamaClient::from_config(&config)?;
        Ok(Self {
            config,
            client,
            state: SupervisorState::Starting,
        })
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Starts the backing service, preloads models and then waits on it in the foreground.
    ///
    /// Every error return kills the backing service before returning.
    pub async fn run(&mut self) -> Result<Completion, BootstrapError> {
        self.transition(SupervisorState::Starting);
        // Installed before the child exists so no signal can orphan it.
        let mut signals = ShutdownSignals::install();
        let mut child = match self.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.transition(SupervisorState::Aborted);
                return Err(err);
            }
        };

        let prepared = tokio::select! {
            prepared = self.prepare(&mut child) => prepared,
            signal = signals.recv() => Err(BootstrapError::Interrupted(signal)),
        };

        let report = match prepared {
            Ok(report) => report,
            Err(err) => {
                self.abort(&mut child).await;
                return Err(err);
            }
        };

        self.transition(SupervisorState::HandoffToForeground);
        let exit_code = handoff(child, &mut signals).await?;
        Ok(Completion { report, exit_code })
    }

    fn transition(&mut self, next: SupervisorState) {
        debug!(from = ?self.state, to = ?next, "supervisor state change");
        self.state = next;
    }

    fn spawn(&self) -> Result<Child, BootstrapError> {
        let mut command = Command::new(&self.config.backend_bin);
        command
            .args(&self.config.backend_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(host) = &self.config.backend_host {
            command.env("OLLAMA_HOST", host);
        }
        if let Some(dir) = &self.config.data_dir {
            command.env("OLLAMA_MODELS", dir);
        }

        let child = command
            .spawn()
            .map_err(|source| BootstrapError::SpawnFailed {
                program: self.config.backend_bin.clone(),
                source,
            })?;
        info!(
            program = %self.config.backend_bin,
            pid = child.id(),
            url = %self.config.backend_url,
            "backing service started"
        );
        Ok(child)
    }

    async fn prepare(
        &mut self,
        child: &mut Child,
    ) -> Result<Option<ReconcileReport>, BootstrapError> {
        self.transition(SupervisorState::WaitingReady);

        let readiness = tokio::select! {
            readiness = readiness::wait_for_service(
                &self.client,
                self.config.ready_max_attempts,
                self.config.ready_interval,
            ) => readiness,
            status = child.wait() => {
                return Err(BootstrapError::BackendExited {
                    status: status?.to_string(),
                });
            }
        };

        if let Readiness::TimedOut { attempts } = readiness {
            self.transition(SupervisorState::TimedOut);
            return Err(BootstrapError::ReadinessTimeout { attempts });
        }

        self.transition(SupervisorState::Reconciling);
        preload_models(&self.client, &self.config.models_file).await
    }

    async fn abort(&mut self, child: &mut Child) {
        self.transition(SupervisorState::Aborted);
        if let Err(err) = child.start_kill() {
            debug!(error = %err, "backing service already gone");
        }
        match child.wait().await {
            Ok(status) => info!(%status, "backing service stopped"),
            Err(err) => warn!(error = %err, "failed to reap backing service"),
        }
    }
}

/// Loads the manifest and reconciles it against the service.
///
/// Returns `Ok(None)` when the manifest is missing or lists nothing.
pub async fn preload_models<S>(
    service: &S,
    models_file: &Path,
) -> Result<Option<ReconcileReport>, BootstrapError>
where
    S: BackingService + ?Sized,
{
    let desired = match load_desired(models_file) {
        Ok(desired) => desired,
        Err(err) if !err.is_fatal() => {
            info!(reason = %err, "skipping model preload");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    info!(count = desired.len(), manifest = %models_file.display(), "preloading models");
    let report = reconcile(&desired, service, |model| async move {
        service.pull(&model).await
    })
    .await;
    Ok(Some(report))
}

/// Waits on the backing service as the foreground workload, forwarding termination to it.
async fn handoff(mut child: Child, signals: &mut ShutdownSignals) -> Result<u8, BootstrapError> {
    info!(pid = child.id(), "handing off to backing service");
    let mut forwarded = false;

    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status?;
                info!(%status, "backing service exited");
                let code = match status.code() {
                    Some(code) => u8::try_from(code).unwrap_or(1),
                    None if forwarded => 0,
                    None => 1,
                };
                return Ok(code);
            }
            signal = signals.recv() => {
                if forwarded {
                    warn!(signal, "second termination signal, killing backing service");
                    child.start_kill()?;
                } else {
                    info!(signal, "forwarding termination to backing service");
                    terminate(&mut child)?;
                    forwarded = true;
                }
            }
        }
    }
}

/// Asks the child to stop with SIGTERM, killing it outright if that cannot be delivered.
#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<(), BootstrapError> {
    use nix::{
        sys::signal::{Signal as NixSignal, kill},
        unistd::Pid,
    };

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let Ok(raw) = i32::try_from(pid) else {
        child.start_kill()?;
        return Ok(());
    };

    if let Err(errno) = kill(Pid::from_raw(raw), NixSignal::SIGTERM) {
        error!(pid, %errno, "could not deliver SIGTERM, killing backing service");
        child.start_kill()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<(), BootstrapError> {
    child.start_kill()?;
    Ok(())
}

/// Termination signal listeners, registered once for the whole run.
struct ShutdownSignals {
    #[cfg(unix)]
    term: Option<Signal>,
    #[cfg(unix)]
    interrupt: Option<Signal>,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> Self {
        Self {
            term: listen(SignalKind::terminate(), "SIGTERM"),
            interrupt: listen(SignalKind::interrupt(), "SIGINT"),
        }
    }

    #[cfg(not(unix))]
    fn install() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = next(&mut self.term) => "SIGTERM",
            _ = next(&mut self.interrupt) => "SIGINT",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}

#[cfg(unix)]
fn listen(kind: SignalKind, name: &'static str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(signal = name, error = %err, "cannot listen for signal");
            None
        }
    }
}

/// Resolves on the next delivery; never resolves for a missing or closed stream.
#[cfg(unix)]
async fn next(stream: &mut Option<Signal>) {
    if let Some(stream) = stream {
        if stream.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}
