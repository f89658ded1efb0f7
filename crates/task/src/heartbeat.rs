use super::error::TaskError;
use super::sink::Sink;
use super::Task;
use ctx::{Background, Ctx};
use miette::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const HEARTBEAT_MESSAGE: &str = "Running...";

/// Emits [`HEARTBEAT_MESSAGE`] until stopped.
///
/// There are two ways to stop it: clear the shared flag with
/// [`HeartbeatTask::stop_beating`] from any clone, or cancel the context the
/// task runs with. Clones share the flag, so keep one around to stop the
/// task after handing the other to its thread.
#[derive(Debug, Clone)]
pub struct HeartbeatTask<S>
where
    S: Sink,
{
    keep_running: Arc<AtomicBool>,
    pause: Duration,
    sink: S,
}

impl<S> HeartbeatTask<S>
where
    S: Sink,
{
    pub fn new(pause: Duration, sink: S) -> Self {
        Self {
            keep_running: Arc::new(AtomicBool::new(true)),
            pause,
            sink,
        }
    }

    pub fn stop_beating(&self) {
        if self.keep_running.swap(false, Ordering::SeqCst) {
            tracing::debug!("Heartbeat stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.keep_running.load(Ordering::SeqCst)
    }
}

impl<S> Task for HeartbeatTask<S>
where
    S: Sink,
{
    #[tracing::instrument(skip(self, ctx))]
    fn run(self, ctx: Ctx<Background>) -> Result<()> {
        while self.keep_running.load(Ordering::SeqCst) {
            self.sink
                .emit(HEARTBEAT_MESSAGE)
                .map_err(TaskError::from)?;

            if ctx.sleep(self.pause).is_err() {
                tracing::debug!("Heartbeat cancelled");
                self.keep_running.store(false, Ordering::SeqCst);
            }
        }

        tracing::debug!("Heartbeat stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{BufferSink, MockSink};
    use crate::testing::panic_after;
    use std::io;
    use std::thread;

    fn wait_for_lines(sink: &BufferSink, count: usize) {
        while sink.lines().len() < count {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_stop_with_flag() {
        panic_after(Duration::from_secs(10), || {
            let background = ctx::background();
            let sink = BufferSink::new();
            let heart = HeartbeatTask::new(Duration::from_millis(20), sink.clone());

            let beating = heart.clone();
            let task_ctx = background.to_background();
            let handle = thread::spawn(move || beating.run(task_ctx));

            wait_for_lines(&sink, 2);
            heart.stop_beating();
            let emitted_at_stop = sink.lines().len();

            handle
                .join()
                .expect("heartbeat thread panicked")
                .expect("heartbeat to stop cleanly");

            assert!(!heart.is_running());
            let emitted = sink.lines();
            assert!(emitted.len() <= emitted_at_stop + 1);
            assert!(emitted.iter().all(|line| line == HEARTBEAT_MESSAGE));
        });
    }

    #[test]
    fn test_stop_with_cancel() {
        panic_after(Duration::from_secs(5), || {
            let background = ctx::background();
            let ctx = background.with_cancel();
            let sink = BufferSink::new();
            let heart = HeartbeatTask::new(Duration::from_secs(30), sink.clone());

            let beating = heart.clone();
            let task_ctx = ctx.to_background();
            let handle = thread::spawn(move || beating.run(task_ctx));

            wait_for_lines(&sink, 1);
            assert!(heart.is_running());
            ctx.cancel();

            handle
                .join()
                .expect("heartbeat thread panicked")
                .expect("cancellation is not an error");

            assert!(!heart.is_running());
            assert_eq!(sink.lines(), vec![HEARTBEAT_MESSAGE]);
        });
    }

    #[test]
    fn stop_beating_is_idempotent() {
        let heart = HeartbeatTask::new(Duration::from_millis(1), BufferSink::new());
        assert!(heart.is_running());

        heart.stop_beating();
        heart.stop_beating();

        assert!(!heart.is_running());
    }

    #[test]
    fn stopped_before_run_emits_nothing() {
        let background = ctx::background();
        let sink = BufferSink::new();
        let heart = HeartbeatTask::new(Duration::from_millis(1), sink.clone());
        heart.stop_beating();

        heart
            .clone()
            .run(background.clone())
            .expect("heartbeat to stop cleanly");

        assert!(sink.lines().is_empty());
    }

    #[test]
    fn sink_error_is_returned() {
        let background = ctx::background();
        let mut sink = MockSink::new();
        sink.expect_emit()
            .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")))
            .times(1);

        let result = HeartbeatTask::new(Duration::from_millis(1), sink).run(background.clone());
        assert!(result.is_err());
    }
}
