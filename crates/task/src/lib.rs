use ctx::{Background, Ctx};
use miette::Result;

pub mod counting;
pub mod error;
pub mod heartbeat;
pub mod sink;
#[cfg(any(test, feature = "mockall"))]
pub mod testing;

pub use counting::{CountingTask, Parity};
pub use error::TaskError;
pub use heartbeat::HeartbeatTask;
pub use sink::{BufferSink, Sink, StdoutSink};

/// A unit of work run on its own thread.
///
/// `run` consumes the value it is called on. Cloneable tasks such as
/// [`HeartbeatTask`] share their state between clones, so only hand one clone
/// to a thread. Cancellation of `ctx` is a normal way to finish and must not
/// be reported as an error.
pub trait Task: Send + 'static {
    fn run(self, ctx: Ctx<Background>) -> Result<()>;
}
