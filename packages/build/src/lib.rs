//! Build orchestration over the `ts` host compiler.
//!
//! Callers register ordered transform passes tagged with the emit phases they
//! run in, then drive one-shot or watch-mode builds of a project and its
//! references. Progress is published as [`BuildEvent`]s.

pub mod error;
pub mod events;
pub mod logging;
pub mod options;
pub mod orchestrator;
pub mod transform;
pub mod units;
pub mod visitor;
pub mod watch;

pub use error::{BuildError, Result};
pub use events::{BuildEvent, BuildEventKind, EventEmitter, ListenerId, OutputsSkippedReason, Solution};
pub use logging::{ConsoleLogger, LogLevel, Logger, NullLogger};
pub use options::BuilderOptions;
pub use orchestrator::{BuildSummary, Orchestrator, WatchHandle};
pub use transform::{
    Recursion, TransformEnvironment, TransformPass, TransformPhase, TransformRegistry,
    TransformUnit, VisitContext,
};
pub use units::{classify, BuildUnits, ProjectOutcome, UnitStep};
pub use visitor::Dispatcher;
pub use watch::{WatchFilter, WatchManager};

// Host types that appear in this crate's public signatures.
pub use ts::{
    BuildOptions, CancellationToken, CompilerOptions, Diagnostic, ExitStatus, Node, SyntaxKind,
    VisitResult,
};
