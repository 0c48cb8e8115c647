// Transform Pass
//
// A pass is plain data: a name, the phases it runs in, a visit function and
// the optional hooks that keep its output structurally valid.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use ts::{visit_each_child, visit_node, Error, Node, Result, VisitResult};

use super::environment::{TransformEnvironment, TransformPhase};
use crate::visitor::Dispatcher;

pub type VisitFn = Rc<dyn Fn(Node, &VisitContext<'_, '_>) -> Result<VisitResult>>;
pub type NodeTestFn = Rc<dyn Fn(&Node) -> bool>;
pub type LiftFn = Rc<dyn Fn(Vec<Node>) -> Node>;

/// Who walks the children of visited nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recursion {
    /// The dispatcher visits every node of the tree. A visit that calls
    /// [`VisitContext::transform_children`] walks that subtree itself and
    /// the dispatcher does not descend into its result again.
    #[default]
    Automatic,
    /// Only the root is visited; the pass recurses with
    /// [`VisitContext::transform_children`].
    Manual,
}

/// What a visit function sees besides the node.
pub struct VisitContext<'p, 'e> {
    pass: &'p TransformPass,
    env: &'p TransformEnvironment<'e>,
    dispatcher: Option<&'p Dispatcher<'p, 'e>>,
    descended: Cell<bool>,
}

impl<'p, 'e> VisitContext<'p, 'e> {
    pub fn new(pass: &'p TransformPass, env: &'p TransformEnvironment<'e>) -> Self {
        Self {
            pass,
            env,
            dispatcher: None,
            descended: Cell::new(false),
        }
    }

    pub(crate) fn dispatched(
        pass: &'p TransformPass,
        env: &'p TransformEnvironment<'e>,
        dispatcher: &'p Dispatcher<'p, 'e>,
    ) -> Self {
        Self {
            pass,
            env,
            dispatcher: Some(dispatcher),
            descended: Cell::new(false),
        }
    }

    /// Whether the visit already walked the subtree it returns.
    pub(crate) fn has_descended(&self) -> bool {
        self.descended.get()
    }

    pub fn env(&self) -> &TransformEnvironment<'e> {
        self.env
    }

    pub fn phase(&self) -> TransformPhase {
        self.env.phase()
    }

    pub fn pass_name(&self) -> &str {
        &self.pass.name
    }

    /// Visit the children of `node` with this pass, keeping `node` itself.
    ///
    /// Under automatic recursion the children are dispatched with their whole
    /// subtrees; under manual recursion each child is visited once.
    pub fn transform_children(&self, node: Node) -> Result<Node> {
        match self.dispatcher {
            Some(dispatcher) => {
                self.descended.set(true);
                dispatcher.descend(node)
            }
            None => self.pass.transform_children(node, self.env),
        }
    }

    /// Error attributed to this pass.
    pub fn error(&self, message: impl ToString) -> Error {
        Error::transform(&self.pass.name, message)
    }
}

#[derive(Clone)]
pub struct TransformPass {
    name: String,
    phases: SmallVec<[TransformPhase; 3]>,
    recursion: Recursion,
    visit: VisitFn,
    test: Option<NodeTestFn>,
    lift: Option<LiftFn>,
}

impl TransformPass {
    /// A `Before` pass with automatic recursion.
    pub fn new<F>(name: impl Into<String>, visit: F) -> Self
    where
        F: Fn(Node, &VisitContext<'_, '_>) -> Result<VisitResult> + 'static,
    {
        Self {
            name: name.into(),
            phases: SmallVec::from_slice(&[TransformPhase::Before]),
            recursion: Recursion::Automatic,
            visit: Rc::new(visit),
            test: None,
            lift: None,
        }
    }

    /// Replace the declared phases. Duplicates are dropped.
    pub fn with_phases(mut self, phases: &[TransformPhase]) -> Self {
        self.phases.clear();
        for phase in phases {
            if !self.phases.contains(phase) {
                self.phases.push(*phase);
            }
        }
        self
    }

    pub fn with_recursion(mut self, recursion: Recursion) -> Self {
        self.recursion = recursion;
        self
    }

    /// Reject rewritten nodes for which `test` is false.
    pub fn with_test<F>(mut self, test: F) -> Self
    where
        F: Fn(&Node) -> bool + 'static,
    {
        self.test = Some(Rc::new(test));
        self
    }

    /// Collapse several nodes written to a single-node position.
    pub fn with_lift<F>(mut self, lift: F) -> Self
    where
        F: Fn(Vec<Node>) -> Node + 'static,
    {
        self.lift = Some(Rc::new(lift));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phases(&self) -> &[TransformPhase] {
        &self.phases
    }

    pub fn declares(&self, phase: TransformPhase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn recursion(&self) -> Recursion {
        self.recursion
    }

    pub(crate) fn test_fn(&self) -> Option<&(dyn Fn(&Node) -> bool + 'static)> {
        self.test.as_deref()
    }

    pub(crate) fn lift_fn(&self) -> Option<&(dyn Fn(Vec<Node>) -> Node + 'static)> {
        self.lift.as_deref()
    }

    /// Run the visit function on one node.
    pub fn visit(&self, node: Node, env: &TransformEnvironment<'_>) -> Result<VisitResult> {
        self.visit_in(node, &VisitContext::new(self, env))
    }

    pub(crate) fn visit_in(&self, node: Node, ctx: &VisitContext<'_, '_>) -> Result<VisitResult> {
        (self.visit)(node, ctx)
    }

    /// Rewrite a whole tree. The root must come back as a single node.
    pub fn transform(&self, root: Node, env: &TransformEnvironment<'_>) -> Result<Node> {
        let kind = root.kind;
        let rewritten = match self.recursion {
            Recursion::Automatic => {
                let dispatcher = Dispatcher::new(self, env);
                visit_node(root, &mut |node| dispatcher.dispatch(node), self.test_fn(), self.lift_fn())?
            }
            Recursion::Manual => visit_node(root, &mut |node| self.visit(node, env), self.test_fn(), self.lift_fn())?,
        };
        rewritten.ok_or(Error::RootRemoved { kind })
    }

    /// Visit each child of `node` once, splicing the results in place.
    pub fn transform_children(&self, node: Node, env: &TransformEnvironment<'_>) -> Result<Node> {
        visit_each_child(node, &mut |child| self.visit(child, env), self.test_fn(), self.lift_fn())
    }
}

impl fmt::Debug for TransformPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformPass")
            .field("name", &self.name)
            .field("phases", &self.phases)
            .field("recursion", &self.recursion)
            .field("test", &self.test.is_some())
            .field("lift", &self.lift.is_some())
            .finish()
    }
}
