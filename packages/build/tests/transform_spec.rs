// Transform Integration Tests
//
// Passes registered on an orchestrator and run through real project builds.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use ts::checker::Type;
use ts::node::factory;
use ts::testing::InMemorySystem;
use ts_build::{
    BuildError, Node, Orchestrator, Recursion, SyntaxKind, TransformPass, TransformPhase,
    TransformRegistry, VisitResult,
};

fn project(files: &[(&str, &str)]) -> Rc<InMemorySystem> {
    let sys = Rc::new(InMemorySystem::new("/p"));
    for (path, text) in files {
        sys.write(path, text);
    }
    sys
}

fn build(sys: &Rc<InMemorySystem>, registry: Option<TransformRegistry>) -> ts_build::Result<()> {
    let orchestrator = Orchestrator::with_system(sys.clone(), "tsconfig.json", registry, None)?;
    orchestrator.build(None, None, None)?;
    Ok(())
}

fn read(sys: &InMemorySystem, path: &str) -> String {
    sys.read(path).unwrap_or_else(|| panic!("{} was not written", path))
}

fn rename_property(mut node: Node, rename: impl Fn(&str) -> String) -> Node {
    let is_property = matches!(
        node.kind,
        SyntaxKind::PropertyDeclaration | SyntaxKind::PropertySignature | SyntaxKind::PropertyAssignment
    );
    if is_property {
        if let Some(name) = node.children.first_mut() {
            name.text = Some(rename(name.text()));
        }
    }
    node
}

fn uppercase_properties() -> TransformPass {
    TransformPass::new("uppercase-properties", |node, _| {
        Ok(rename_property(node, str::to_uppercase).into())
    })
    .with_phases(&[TransformPhase::Before, TransformPhase::AfterDeclarations])
}

fn magic_properties() -> TransformPass {
    TransformPass::new("magic-properties", |node, _| {
        Ok(rename_property(node, |name| format!("magic{}", name)).into())
    })
    .with_phases(&[TransformPhase::After, TransformPhase::AfterDeclarations])
}

#[test]
fn should_apply_passes_to_javascript_and_declarations() {
    let sys = project(&[
        ("/p/tsconfig.json", r#"{ "compilerOptions": { "declaration": true } }"#),
        ("/p/index.ts", "export class Thing {\n    property = 1;\n}\n"),
    ]);
    let mut registry = TransformRegistry::new();
    registry.add(uppercase_properties()).add(magic_properties());

    build(&sys, Some(registry)).unwrap();

    let js = read(&sys, "/p/index.js");
    let dts = read(&sys, "/p/index.d.ts");
    assert!(js.contains("magicPROPERTY"), "{}", js);
    assert!(dts.contains("magicPROPERTY"), "{}", dts);
    assert!(!js.contains("property ="));
}

#[test]
fn should_emit_identical_output_for_identity_passes() {
    let files = [
        ("/p/tsconfig.json", r#"{ "compilerOptions": { "declaration": true } }"#),
        (
            "/p/index.ts",
            "export const settings = { retries: 3, name: 'x' };\nexport class Box { size: number = 1; }\n",
        ),
    ];
    let plain = project(&files);
    build(&plain, None).unwrap();

    let transformed = project(&files);
    let mut registry = TransformRegistry::new();
    registry
        .add(TransformPass::new("identity", |node, _| Ok(node.into())).with_phases(&TransformPhase::ALL))
        .add(
            TransformPass::new("manual-identity", |node, ctx| Ok(ctx.transform_children(node)?.into()))
                .with_recursion(Recursion::Manual)
                .with_phases(&TransformPhase::ALL),
        );
    build(&transformed, Some(registry)).unwrap();

    assert_eq!(read(&transformed, "/p/index.js"), read(&plain, "/p/index.js"));
    assert_eq!(read(&transformed, "/p/index.d.ts"), read(&plain, "/p/index.d.ts"));
}

#[test]
fn should_pass_spliced_statements_through_later_before_passes() {
    let sys = project(&[
        ("/p/tsconfig.json", "{}"),
        ("/p/index.ts", "split;\nlast;\n"),
    ]);
    let split = TransformPass::new("split", |node, _| {
        let is_split = node.is(SyntaxKind::ExpressionStatement)
            && node.children.first().map(Node::text) == Some("split");
        if is_split {
            return Ok(VisitResult::Many(vec![
                factory::expression_statement(factory::identifier("first")),
                factory::expression_statement(factory::identifier("second")),
            ]));
        }
        Ok(node.into())
    });
    let shout = TransformPass::new("shout", |node, _| {
        if node.is(SyntaxKind::Identifier) {
            let upper = node.text().to_uppercase();
            return Ok(node.with_text(upper).into());
        }
        Ok(node.into())
    });
    let mut registry = TransformRegistry::new();
    registry.add(split).add(shout);

    build(&sys, Some(registry)).unwrap();
    assert_eq!(read(&sys, "/p/index.js"), "FIRST;\nSECOND;\nLAST;\n");
}

#[test]
fn should_rename_once_when_a_pass_recurses_through_its_children() {
    let sys = project(&[
        ("/p/tsconfig.json", "{}"),
        ("/p/index.ts", "const config = { deep: { x: 1 } };\n"),
    ]);
    let prefix = TransformPass::new("prefix", |node, ctx| {
        let node = if node.is(SyntaxKind::Identifier) {
            let text = format!("magic{}", node.text());
            node.with_text(text)
        } else {
            node
        };
        Ok(ctx.transform_children(node)?.into())
    });
    let mut registry = TransformRegistry::new();
    registry.add(prefix);

    build(&sys, Some(registry)).unwrap();
    let js = read(&sys, "/p/index.js");
    assert!(js.contains("magicx"), "{}", js);
    assert!(!js.contains("magicmagic"), "{}", js);
    assert_eq!(js, "const magicconfig = { magicdeep: { magicx: 1 } };\n");
}

#[test]
fn should_remove_absent_nodes_from_the_output() {
    let sys = project(&[
        ("/p/tsconfig.json", "{}"),
        ("/p/index.ts", "const config = { keep: 1, drop: { deep: 2 }, also: 3 };\n"),
    ]);
    let drop = TransformPass::new("drop", |node, _| {
        if node.is(SyntaxKind::PropertyAssignment) && node.name_text() == Some("drop") {
            return Ok(VisitResult::Absent);
        }
        Ok(node.into())
    });
    let mut registry = TransformRegistry::new();
    registry.add(drop);

    build(&sys, Some(registry)).unwrap();
    let js = read(&sys, "/p/index.js");
    assert!(js.contains("keep: 1"), "{}", js);
    assert!(js.contains("also: 3"), "{}", js);
    assert!(!js.contains("deep"), "{}", js);
    assert!(js.find("keep").unwrap() < js.find("also").unwrap());
}

#[test]
fn should_abort_the_build_when_a_pass_fails() {
    let sys = project(&[
        ("/p/tsconfig.json", "{}"),
        ("/p/index.ts", "let forbidden = 1;\n"),
    ]);
    let strict = TransformPass::new("strict", |node, ctx| {
        if node.is(SyntaxKind::Identifier) && node.text() == "forbidden" {
            return Err(ctx.error("identifier 'forbidden' is not allowed"));
        }
        Ok(node.into())
    });
    let mut registry = TransformRegistry::new();
    registry.add(strict);

    let error = build(&sys, Some(registry)).unwrap_err();
    assert!(matches!(error, BuildError::Transform(_)));
    assert_eq!(
        error.to_string(),
        "transform 'strict' failed: identifier 'forbidden' is not allowed"
    );
    assert!(sys.read("/p/index.js").is_none());
}

#[test]
fn should_expose_the_program_to_passes() {
    let sys = project(&[
        ("/p/tsconfig.json", "{}"),
        ("/p/index.ts", "const limit = 10;\nlet label = 'x';\n"),
    ]);
    let seen: Rc<RefCell<Vec<(String, Option<Type>)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let probe = TransformPass::new("probe", move |node, ctx| {
        let env = ctx.env();
        for name in ["limit", "label"] {
            let ty = env
                .resolve_symbol(name, Some(Path::new(node.text())))
                .and_then(|symbol| env.type_of_symbol(symbol));
            sink.borrow_mut().push((name.to_string(), ty));
        }
        Ok(node.into())
    })
    .with_recursion(Recursion::Manual);
    let mut registry = TransformRegistry::new();
    registry.add(probe);

    build(&sys, Some(registry)).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![
            ("limit".to_string(), Some(Type::Number)),
            ("label".to_string(), Some(Type::String)),
        ]
    );
}
