// Host Errors
//
// Failures that abort a tree transformation or a project build. Ordinary
// compiler problems are diagnostics, never errors.

use thiserror::Error;

use crate::node::SyntaxKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Raised by a transform pass.
    #[error("transform '{pass}' failed: {message}")]
    Transform { pass: String, message: String },

    #[error("{0}")]
    Custom(String),

    #[error("too many nodes written to a single {slot:?} slot; the pass must supply a lift function")]
    TooManyNodes { slot: SyntaxKind },

    #[error("visitor produced an invalid {found:?} node inside {parent:?}")]
    InvalidNode { parent: SyntaxKind, found: SyntaxKind },

    #[error("visitor removed a required child of {parent:?}")]
    RequiredNodeRemoved { parent: SyntaxKind },

    #[error("visitor removed the root {kind:?} node")]
    RootRemoved { kind: SyntaxKind },

    #[error("Operation was canceled")]
    OperationCanceled,
}

impl Error {
    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(message.into())
    }

    pub fn transform(pass: impl Into<String>, message: impl ToString) -> Self {
        Error::Transform {
            pass: pass.into(),
            message: message.to_string(),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::OperationCanceled)
    }
}
