// Tree Visitor Dispatcher
//
// Depth-first rewrite driven by one pass. The pass visits a node first; the
// dispatcher then descends into the children of whatever the pass returned,
// so recursion always runs on the rewritten tree. A visit that recurses with
// `transform_children` has already walked its result.

use ts::{visit_each_child, Node, Result, VisitResult};

use crate::transform::{TransformEnvironment, TransformPass, VisitContext};

pub struct Dispatcher<'p, 'e> {
    pass: &'p TransformPass,
    env: &'p TransformEnvironment<'e>,
}

impl<'p, 'e> Dispatcher<'p, 'e> {
    pub fn new(pass: &'p TransformPass, env: &'p TransformEnvironment<'e>) -> Self {
        Self { pass, env }
    }

    /// Visit `node`, then every descendant of the result.
    ///
    /// `Absent` stops the walk for that subtree. Several results are each
    /// descended into and returned in order.
    pub fn dispatch(&self, node: Node) -> Result<VisitResult> {
        let ctx = VisitContext::dispatched(self.pass, self.env, self);
        let result = self.pass.visit_in(node, &ctx)?;
        if ctx.has_descended() {
            return Ok(result);
        }
        match result {
            VisitResult::Absent => Ok(VisitResult::Absent),
            VisitResult::Single(node) => Ok(VisitResult::Single(self.descend(node)?)),
            VisitResult::Many(nodes) => {
                let nodes = nodes
                    .into_iter()
                    .map(|node| self.descend(node))
                    .collect::<Result<Vec<_>>>()?;
                Ok(VisitResult::from_nodes(nodes))
            }
        }
    }

    pub(crate) fn descend(&self, node: Node) -> Result<Node> {
        if node.children.is_empty() {
            return Ok(node);
        }
        visit_each_child(
            node,
            &mut |child| self.dispatch(child),
            self.pass.test_fn(),
            self.pass.lift_fn(),
        )
    }
}
