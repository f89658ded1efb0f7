use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(code(task::task_error))]
pub enum TaskError {
    #[error("failed to write to the output sink")]
    SinkError(#[from] io::Error),
}
