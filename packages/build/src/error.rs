// Build Errors
//
// Fatal orchestration failures. Compiler problems are never errors here; they
// travel as `BuildEvent::Diagnostic`.

use std::path::PathBuf;

use thiserror::Error;
use ts::Diagnostic;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("config file '{}' does not exist", .0.display())]
    ConfigNotFound(PathBuf),

    /// The root configuration could not be read or parsed.
    #[error("error TS{}: {}", .0.code, .0.message_text)]
    Config(Diagnostic),

    #[error(transparent)]
    Transform(#[from] ts::Error),

    #[error("unsupported exit status {0}")]
    UnsupportedExitStatus(i32),

    #[error("event listener failed: {0:#}")]
    Listener(anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BuildError::Transform(error) if error.is_cancellation())
    }
}
