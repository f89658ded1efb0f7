use super::error::TaskError;
use super::sink::Sink;
use super::Task;
use ctx::{Background, Ctx};
use miette::Result;
use std::time::Duration;

pub const STEP: u32 = 2;
pub const LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn start(self) -> u32 {
        match self {
            Parity::Even => 0,
            Parity::Odd => 1,
        }
    }
}

/// Counts from the parity's start value up to [`LIMIT`] in steps of
/// [`STEP`], pausing between values. Not `Clone`: each counter runs once.
#[derive(Debug)]
pub struct CountingTask<S>
where
    S: Sink,
{
    parity: Parity,
    pause: Duration,
    sink: S,
}

impl<S> CountingTask<S>
where
    S: Sink,
{
    pub fn new(parity: Parity, pause: Duration, sink: S) -> Self {
        Self { parity, pause, sink }
    }

    pub fn evens(pause: Duration, sink: S) -> Self {
        Self::new(Parity::Even, pause, sink)
    }

    pub fn odds(pause: Duration, sink: S) -> Self {
        Self::new(Parity::Odd, pause, sink)
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    /// The full sequence a run emits when it is not cancelled.
    pub fn values(&self) -> impl Iterator<Item = u32> {
        (self.parity.start()..=LIMIT).step_by(STEP as usize)
    }
}

impl<S> Task for CountingTask<S>
where
    S: Sink,
{
    #[tracing::instrument(skip(self, ctx), fields(parity = ?self.parity))]
    fn run(self, ctx: Ctx<Background>) -> Result<()> {
        tracing::debug!("Counting from {} to {LIMIT}", self.parity.start());
        for value in self.values() {
            self.sink
                .emit(&value.to_string())
                .map_err(TaskError::from)?;

            if ctx.sleep(self.pause).is_err() {
                tracing::debug!("Counting cancelled after {value}");
                return Ok(());
            }
        }

        tracing::debug!("Counting finished");
        Ok(())
    }
}
