// Build Events
//
// Closed set of lifecycle events and a synchronous, single-threaded emitter.
// Listeners run in subscription order; the first failing listener stops the
// emit and its error is returned to the caller.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ts::Diagnostic;

/// Why a project produced no outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputsSkippedReason {
    DiagnosticsPresent,
    InvalidProject,
    ProjectReferenceCycle,
}

/// The projects one watch-mode pass covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    /// Configuration paths the pass started from.
    pub roots: Vec<PathBuf>,
    /// Every project reachable from the roots, references first.
    pub build_order: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// A watch-mode pass is starting.
    BeforeSolution { solution: Solution },
    /// A watch-mode pass finished with `error_count` error diagnostics.
    AfterSolution { solution: Solution, error_count: usize },
    BeforeProject { project: PathBuf },
    AfterProject { project: PathBuf },
    OutputsGenerated { project: PathBuf },
    OutputsSkipped {
        project: PathBuf,
        reason: OutputsSkippedReason,
    },
    Diagnostic(Diagnostic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildEventKind {
    BeforeSolution,
    AfterSolution,
    BeforeProject,
    AfterProject,
    OutputsGenerated,
    OutputsSkipped,
    Diagnostic,
}

impl BuildEventKind {
    pub const ALL: [BuildEventKind; 7] = [
        BuildEventKind::BeforeSolution,
        BuildEventKind::AfterSolution,
        BuildEventKind::BeforeProject,
        BuildEventKind::AfterProject,
        BuildEventKind::OutputsGenerated,
        BuildEventKind::OutputsSkipped,
        BuildEventKind::Diagnostic,
    ];
}

impl BuildEvent {
    pub fn kind(&self) -> BuildEventKind {
        match self {
            BuildEvent::BeforeSolution { .. } => BuildEventKind::BeforeSolution,
            BuildEvent::AfterSolution { .. } => BuildEventKind::AfterSolution,
            BuildEvent::BeforeProject { .. } => BuildEventKind::BeforeProject,
            BuildEvent::AfterProject { .. } => BuildEventKind::AfterProject,
            BuildEvent::OutputsGenerated { .. } => BuildEventKind::OutputsGenerated,
            BuildEvent::OutputsSkipped { .. } => BuildEventKind::OutputsSkipped,
            BuildEvent::Diagnostic(_) => BuildEventKind::Diagnostic,
        }
    }

    /// The solution a watch-mode event is about.
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            BuildEvent::BeforeSolution { solution } | BuildEvent::AfterSolution { solution, .. } => Some(solution),
            _ => None,
        }
    }

    /// The project a per-project event is about.
    pub fn project(&self) -> Option<&Path> {
        match self {
            BuildEvent::BeforeProject { project }
            | BuildEvent::AfterProject { project }
            | BuildEvent::OutputsGenerated { project }
            | BuildEvent::OutputsSkipped { project, .. } => Some(project),
            _ => None,
        }
    }
}

impl fmt::Display for BuildEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildEventKind::BeforeSolution => "beforeSolution",
            BuildEventKind::AfterSolution => "afterSolution",
            BuildEventKind::BeforeProject => "beforeProject",
            BuildEventKind::AfterProject => "afterProject",
            BuildEventKind::OutputsGenerated => "outputsGenerated",
            BuildEventKind::OutputsSkipped => "outputsSkipped",
            BuildEventKind::Diagnostic => "diagnostic",
        };
        f.write_str(name)
    }
}

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Rc<dyn Fn(&BuildEvent) -> anyhow::Result<()>>;

struct Subscription {
    id: ListenerId,
    kind: BuildEventKind,
    once: bool,
    listener: Listener,
}

#[derive(Default)]
pub struct EventEmitter {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.subscriptions.borrow().len())
            .finish()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(&self, kind: BuildEventKind, once: bool, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            kind,
            once,
            listener,
        });
        id
    }

    pub fn on<F>(&self, kind: BuildEventKind, listener: F) -> ListenerId
    where
        F: Fn(&BuildEvent) -> anyhow::Result<()> + 'static,
    {
        self.subscribe(kind, false, Rc::new(listener))
    }

    /// Like `on`, but the listener is removed before its first call.
    pub fn once<F>(&self, kind: BuildEventKind, listener: F) -> ListenerId
    where
        F: Fn(&BuildEvent) -> anyhow::Result<()> + 'static,
    {
        self.subscribe(kind, true, Rc::new(listener))
    }

    /// Returns whether the listener was still subscribed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Remove the listeners of one event kind, or of every kind.
    pub fn remove_all_listeners(&self, kind: Option<BuildEventKind>) {
        match kind {
            Some(kind) => self.subscriptions.borrow_mut().retain(|s| s.kind != kind),
            None => self.subscriptions.borrow_mut().clear(),
        }
    }

    pub fn listener_count(&self, kind: BuildEventKind) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Call the listeners subscribed when the emit starts.
    pub fn emit(&self, event: &BuildEvent) -> anyhow::Result<()> {
        let kind = event.kind();
        let listeners: Vec<Listener> = {
            let mut subscriptions = self.subscriptions.borrow_mut();
            let matching = subscriptions
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| s.listener.clone())
                .collect();
            subscriptions.retain(|s| !(s.once && s.kind == kind));
            matching
        };
        for listener in listeners {
            listener(event)?;
        }
        Ok(())
    }
}
