use config::{Config, StopStrategy};
use ctx::{Background, Cancel, Ctx, Interrupted};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use task::{CountingTask, HeartbeatTask, Sink, Task};

pub const COMPLETION_MESSAGE: &str = "All finished";

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How [`Orchestrator::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Every thread was waited for.
    Completed,
    /// The orchestrator's context was cancelled while waiting, so the
    /// remaining waits were skipped.
    Interrupted,
}

/// A task running on its own thread together with the context that cancels it.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    ctx: Ctx<Cancel>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TaskHandle {
    #[tracing::instrument(skip(task, parent))]
    pub fn spawn<T>(name: &str, task: T, parent: &Ctx<Background>) -> Result<Self>
    where
        T: Task,
    {
        let ctx = parent.with_cancel();
        let task_ctx = ctx.to_background();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || task.run(task_ctx))
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to spawn the {name} thread"))?;

        tracing::debug!("Started {name} thread");
        Ok(Self {
            name: name.to_string(),
            ctx,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Blocks until the thread finishes, returning immediately if it already
    /// has.
    ///
    /// Gives up with `Err(Interrupted)` when `ctx` is cancelled first; the
    /// thread keeps running and can be joined again later.
    pub fn join(&mut self, ctx: &Ctx<Background>) -> Result<(), Interrupted> {
        loop {
            match self.handle.take() {
                None => return Ok(()),
                Some(handle) if handle.is_finished() => {
                    self.reap(handle);
                    return Ok(());
                }
                Some(handle) => {
                    self.handle = Some(handle);
                    ctx.sleep(JOIN_POLL_INTERVAL)?;
                }
            }
        }
    }

    fn reap(&self, handle: JoinHandle<Result<()>>) {
        match handle.join() {
            Ok(Ok(())) => tracing::debug!("Joined {} thread", self.name),
            Ok(Err(e)) => tracing::error!("Task {} returned an error: {e:?}", self.name),
            Err(e) => tracing::error!("Failed to join the {} thread: {e:?}", self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Orchestrator<S>
where
    S: Sink,
{
    config: Config,
    sink: S,
}

impl<S> Orchestrator<S>
where
    S: Sink,
{
    pub fn new(config: Config, sink: S) -> Self {
        Self { config, sink }
    }

    /// Runs two counters and a heartbeat, waits for evens then odds, stops
    /// the heartbeat and waits for it, then emits [`COMPLETION_MESSAGE`].
    ///
    /// Cancelling `ctx` cuts the waits short and cancels every task; the
    /// completion message is emitted either way.
    #[tracing::instrument(skip(self, ctx))]
    pub fn run(&self, ctx: Ctx<Background>) -> Result<Shutdown> {
        // Dropped on every return path, which cancels any thread still running.
        let run_ctx = ctx.with_cancel();
        let run_bg = run_ctx.to_background();

        let odds = CountingTask::odds(self.config.count_pause(), self.sink.clone());
        let evens = CountingTask::evens(self.config.count_pause(), self.sink.clone());
        let heart = HeartbeatTask::new(self.config.heartbeat_pause(), self.sink.clone());

        tracing::info!("Starting threads");
        let mut heartbeat_thread = TaskHandle::spawn("heartbeat", heart.clone(), &run_bg)?;
        let mut even_thread = TaskHandle::spawn("evens", evens, &run_bg)?;
        let mut odd_thread = TaskHandle::spawn("odds", odds, &run_bg)?;

        let shutdown = match self.shutdown(
            &run_bg,
            &heart,
            &mut heartbeat_thread,
            &mut even_thread,
            &mut odd_thread,
        ) {
            Ok(()) => Shutdown::Completed,
            Err(Interrupted) => {
                tracing::warn!("Interrupted while waiting for threads, skipping remaining waits");
                Shutdown::Interrupted
            }
        };

        self.sink
            .emit(COMPLETION_MESSAGE)
            .into_diagnostic()
            .wrap_err("Failed to emit the completion message")?;

        tracing::info!("Orchestrator finished: {shutdown:?}");
        Ok(shutdown)
    }

    fn shutdown(
        &self,
        ctx: &Ctx<Background>,
        heart: &HeartbeatTask<S>,
        heartbeat_thread: &mut TaskHandle,
        even_thread: &mut TaskHandle,
        odd_thread: &mut TaskHandle,
    ) -> Result<(), Interrupted> {
        tracing::debug!("Waiting for {}", even_thread.name());
        even_thread.join(ctx)?;
        tracing::debug!("Waiting for {}", odd_thread.name());
        odd_thread.join(ctx)?;

        match self.config.stop {
            StopStrategy::Flag => {
                tracing::info!("Stopping heartbeat with its flag");
                heart.stop_beating();
            }
            StopStrategy::Cancel => {
                tracing::info!("Cancelling heartbeat");
                heartbeat_thread.cancel();
            }
        }

        heartbeat_thread.join(ctx)
    }
}
