// Node Visiting Primitives
//
// The host's child-rewrite primitives. A visitor maps one node to zero, one or
// many nodes; these functions splice the results back into the parent while
// keeping every slot structurally valid.

use crate::error::{Error, Result};
use crate::node::{Node, NodeCategory, SyntaxKind};

/// Outcome of visiting a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum VisitResult {
    /// Remove the node from its parent.
    Absent,
    /// Replace the node.
    Single(Node),
    /// Splice several nodes in place of the node.
    Many(Vec<Node>),
}

impl VisitResult {
    /// Normalizes a node list: empty is `Absent`, one node is `Single`.
    pub fn from_nodes(mut nodes: Vec<Node>) -> Self {
        match nodes.len() {
            0 => VisitResult::Absent,
            1 => VisitResult::Single(nodes.remove(0)),
            _ => VisitResult::Many(nodes),
        }
    }

    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            VisitResult::Absent => Vec::new(),
            VisitResult::Single(node) => vec![node],
            VisitResult::Many(nodes) => nodes,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, VisitResult::Absent)
    }

    pub fn len(&self) -> usize {
        match self {
            VisitResult::Absent => 0,
            VisitResult::Single(_) => 1,
            VisitResult::Many(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Node> for VisitResult {
    fn from(node: Node) -> Self {
        VisitResult::Single(node)
    }
}

impl From<Option<Node>> for VisitResult {
    fn from(node: Option<Node>) -> Self {
        node.map_or(VisitResult::Absent, VisitResult::Single)
    }
}

impl From<Vec<Node>> for VisitResult {
    fn from(nodes: Vec<Node>) -> Self {
        VisitResult::from_nodes(nodes)
    }
}

pub type Visitor<'a> = dyn FnMut(Node) -> Result<VisitResult> + 'a;
pub type NodeTest<'a> = dyn Fn(&Node) -> bool + 'a;
pub type Lift<'a> = dyn Fn(Vec<Node>) -> Node + 'a;

/// Visit a node that occupies a single-node position.
///
/// Several results are collapsed with `lift`; without one that is an error.
/// `Ok(None)` means the visitor removed the node.
pub fn visit_node(
    node: Node,
    visitor: &mut Visitor<'_>,
    test: Option<&NodeTest<'_>>,
    lift: Option<&Lift<'_>>,
) -> Result<Option<Node>> {
    let kind = node.kind;
    let category = node.kind.category();
    visit_single_slot(kind, category, node, visitor, test, lift)
}

/// Visit a node list, splicing and flattening the results in order.
pub fn visit_nodes(
    parent: SyntaxKind,
    nodes: Vec<Node>,
    visitor: &mut Visitor<'_>,
    test: Option<&NodeTest<'_>>,
) -> Result<Vec<Node>> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let category = node.kind.category();
        for produced in visitor(node)?.into_nodes() {
            check_node(parent, category, &produced, test)?;
            out.push(produced);
        }
    }
    Ok(out)
}

/// Rewrite every child of `node` with `visitor`, leaving `node` itself intact.
pub fn visit_each_child(
    node: Node,
    visitor: &mut Visitor<'_>,
    test: Option<&NodeTest<'_>>,
    lift: Option<&Lift<'_>>,
) -> Result<Node> {
    let categories: Vec<Option<NodeCategory>> =
        (0..node.children.len()).map(|i| node.slot_category(i)).collect();
    let Node {
        kind,
        flags,
        text,
        children,
        pos,
        end,
    } = node;
    let list_start = kind.list_start();

    let mut out = Vec::with_capacity(children.len());
    for (index, child) in children.into_iter().enumerate() {
        let category = categories[index].unwrap_or_else(|| child.kind.category());
        let in_list = list_start.map_or(false, |start| index >= start);
        if in_list {
            for produced in visitor(child)?.into_nodes() {
                check_node(kind, category, &produced, test)?;
                out.push(produced);
            }
        } else {
            match visit_single_slot(kind, category, child, visitor, test, lift)? {
                Some(produced) => out.push(produced),
                None if kind.is_optional_slot(index) => {}
                None => return Err(Error::RequiredNodeRemoved { parent: kind }),
            }
        }
    }

    Ok(Node {
        kind,
        flags,
        text,
        children: out,
        pos,
        end,
    })
}

fn visit_single_slot(
    parent: SyntaxKind,
    category: NodeCategory,
    node: Node,
    visitor: &mut Visitor<'_>,
    test: Option<&NodeTest<'_>>,
    lift: Option<&Lift<'_>>,
) -> Result<Option<Node>> {
    let slot = node.kind;
    let produced = match visitor(node)? {
        VisitResult::Absent => return Ok(None),
        VisitResult::Single(node) => node,
        VisitResult::Many(mut nodes) => match nodes.len() {
            0 => return Ok(None),
            1 => nodes.remove(0),
            _ => match lift {
                Some(lift) => lift(nodes),
                None => return Err(Error::TooManyNodes { slot }),
            },
        },
    };
    check_node(parent, category, &produced, test)?;
    Ok(Some(produced))
}

fn check_node(
    parent: SyntaxKind,
    category: NodeCategory,
    node: &Node,
    test: Option<&NodeTest<'_>>,
) -> Result<()> {
    let valid = category.accepts(node.kind) && test.map_or(true, |test| test(node));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidNode {
            parent,
            found: node.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::factory::*;
    use crate::node::NodeFlags;

    fn source(statements: Vec<Node>) -> Node {
        Node::new(SyntaxKind::SourceFile).with_children(statements)
    }

    fn let_x(value: &str) -> Node {
        variable_statement(
            NodeFlags::LET,
            vec![variable_declaration("x", None, Some(numeric_literal(value)))],
        )
    }

    #[test]
    fn should_splice_many_results_into_lists() {
        let file = source(vec![let_x("1"), let_x("2")]);
        let mut visitor = |node: Node| -> Result<VisitResult> {
            Ok(VisitResult::Many(vec![node.clone(), node]))
        };
        let out = visit_each_child(file, &mut visitor, None, None).unwrap();
        assert_eq!(out.children.len(), 4);
    }

    #[test]
    fn should_drop_absent_optional_slots() {
        let decl = variable_declaration("x", Some(type_reference("number")), Some(numeric_literal("1")));
        let mut visitor = |node: Node| -> Result<VisitResult> {
            if node.kind.is_type_node() {
                Ok(VisitResult::Absent)
            } else {
                Ok(node.into())
            }
        };
        let out = visit_each_child(decl, &mut visitor, None, None).unwrap();
        assert!(out.type_node().is_none());
        assert!(out.initializer().is_some());
    }

    #[test]
    fn should_reject_removing_a_required_child() {
        let stmt = expression_statement(identifier("a"));
        let mut visitor = |_: Node| -> Result<VisitResult> { Ok(VisitResult::Absent) };
        let err = visit_each_child(stmt, &mut visitor, None, None).unwrap_err();
        assert!(matches!(err, Error::RequiredNodeRemoved { .. }));
    }

    #[test]
    fn should_lift_many_nodes_in_single_slots() {
        let stmt = expression_statement(identifier("a"));
        let mut visitor =
            |node: Node| -> Result<VisitResult> { Ok(VisitResult::Many(vec![node.clone(), node])) };
        let err = visit_each_child(stmt.clone(), &mut visitor, None, None).unwrap_err();
        assert!(matches!(err, Error::TooManyNodes { .. }));

        let lift = |nodes: Vec<Node>| comma_list(nodes);
        let out = visit_each_child(stmt, &mut visitor, None, Some(&lift)).unwrap();
        assert_eq!(out.children[0].kind, SyntaxKind::CommaListExpression);
        assert_eq!(out.children[0].children.len(), 2);
    }

    #[test]
    fn should_reject_nodes_from_another_category() {
        let file = source(vec![let_x("1")]);
        let mut visitor = |_: Node| -> Result<VisitResult> { Ok(identifier("oops").into()) };
        let err = visit_each_child(file, &mut visitor, None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidNode { found: SyntaxKind::Identifier, .. }));
    }

    #[test]
    fn should_apply_the_validity_predicate() {
        let file = source(vec![let_x("1")]);
        let mut visitor = |node: Node| -> Result<VisitResult> { Ok(node.into()) };
        let test = |node: &Node| !node.is(SyntaxKind::VariableStatement);
        assert!(visit_each_child(file, &mut visitor, Some(&test), None).is_err());
    }
}
