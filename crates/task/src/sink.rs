#[cfg(any(test, feature = "mockall"))]
use mockall::mock;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Where tasks write their output, one line per emission.
pub trait Sink: Send + Sync + Clone + 'static {
    fn emit(&self, line: &str) -> io::Result<()>;
}

#[cfg(any(test, feature = "mockall"))]
mock! {
    pub Sink {}

    impl Clone for Sink {
        fn clone(&self) -> Self;
    }

    impl Sink for Sink {
        fn emit(&self, line: &str) -> io::Result<()>;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn emit(&self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()
    }
}

/// Keeps every emitted line in memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sink for BufferSink {
    fn emit(&self, line: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}
