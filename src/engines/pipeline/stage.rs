//! Stage plumbing shared by every pipeline worker: a stop signal, a
//! supervised task and the events it reports to the network.

use crate::error::{EqforgeError, Result};
use log::{debug, error};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};

/// How a stage's main loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    /// Its input closed.
    Completed,
    /// It ran out of genomes to work on.
    Exhausted,
    /// Every problem has a validated genome.
    Converged,
    /// It was told to stop.
    Stopped,
}

#[derive(Debug)]
pub enum ControlEvent {
    Finished { stage: String, exit: StageExit },
    Faulted { stage: String, error: EqforgeError },
}

/// Cooperative stop flag observed by one stage.
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn pair() -> (watch::Sender<bool>, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (tx, StopSignal { rx })
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop is requested or the sender is gone.
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A running stage as seen by the supervisor.
pub struct StageHandle {
    name: String,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl StageHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request_stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Requests a stop and waits up to `grace` for the stage to wind down,
    /// aborting it afterwards.
    pub async fn complete(self, grace: Duration) {
        self.request_stop();
        let abort = self.handle.abort_handle();
        if tokio::time::timeout(grace, self.handle).await.is_err() {
            debug!("Stage '{}' did not stop within {:?}, aborting", self.name, grace);
            abort.abort();
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Spawns `body` as a supervised stage.
///
/// The body is dropped at its next await point once stop is requested.
/// Exactly one [`ControlEvent`] is sent when it ends: errors and panics
/// become `Faulted`, everything else `Finished`.
pub fn spawn_stage<F>(name: impl Into<String>, control: mpsc::UnboundedSender<ControlEvent>, body: F) -> StageHandle
where
    F: Future<Output = Result<StageExit>> + Send + 'static,
{
    let name = name.into();
    let (stop_tx, mut stop) = StopSignal::pair();

    let inner = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = stop.stopped() => Ok(StageExit::Stopped),
            exit = body => exit,
        }
    });

    let stage = name.clone();
    let handle = tokio::spawn(async move {
        let _guard = AbortOnDrop(inner.abort_handle());
        let event = match inner.await {
            Ok(Ok(exit)) => {
                debug!("Stage '{}' finished: {:?}", stage, exit);
                ControlEvent::Finished { stage, exit }
            }
            Ok(Err(err)) => {
                error!("Stage '{}' faulted: {}", stage, err);
                ControlEvent::Faulted {
                    error: EqforgeError::in_stage(stage.clone(), err),
                    stage,
                }
            }
            Err(join) if join.is_panic() => {
                error!("Stage '{}' panicked", stage);
                ControlEvent::Faulted {
                    error: EqforgeError::StagePanicked(stage.clone()),
                    stage,
                }
            }
            Err(_) => ControlEvent::Finished {
                stage,
                exit: StageExit::Stopped,
            },
        };
        let _ = control.send(event);
    });

    StageHandle {
        name,
        stop: stop_tx,
        handle,
    }
}

/// Awaits a blocking task, turning a panic into a stage fault.
pub(crate) async fn join_blocking<T>(stage: &str, task: JoinHandle<Result<T>>) -> Result<T> {
    match task.await {
        Ok(result) => result,
        Err(_) => Err(EqforgeError::StagePanicked(stage.to_string())),
    }
}
