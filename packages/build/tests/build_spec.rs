// Build Integration Tests

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ts::testing::InMemorySystem;
use ts::System;
use ts_build::{
    BuildError, BuildEvent, BuildEventKind, BuildOptions, BuildSummary, BuilderOptions,
    CompilerOptions, Orchestrator, OutputsSkippedReason,
};

fn events(orchestrator: &Orchestrator) -> Rc<RefCell<Vec<BuildEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    for kind in BuildEventKind::ALL {
        let sink = seen.clone();
        orchestrator.on(kind, move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });
    }
    seen
}

fn solution() -> Rc<InMemorySystem> {
    let sys = Rc::new(InMemorySystem::new("/repo"));
    sys.write(
        "/repo/tsconfig.json",
        r#"{
            // Solution file: builds nothing itself.
            "files": [],
            "references": [{ "path": "./packages/app" }],
        }"#,
    );
    sys.write(
        "/repo/packages/shared/tsconfig.json",
        r#"{ "compilerOptions": { "composite": true, "outDir": "lib" }, "include": ["src"] }"#,
    );
    sys.write("/repo/packages/shared/src/index.ts", "export const shared = 'shared';");
    sys.write(
        "/repo/packages/app/tsconfig.json",
        r#"{ "compilerOptions": { "outDir": "lib" }, "include": ["src"], "references": [{ "path": "../shared" }] }"#,
    );
    sys.write("/repo/packages/app/src/main.ts", "export const app = 1;");
    sys
}

mod construction {
    use super::*;

    #[test]
    fn should_reject_a_config_that_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let error = Orchestrator::new(dir.path().join("tsconfig.json"), None, None).unwrap_err();
        assert!(error.to_string().contains("does not exist"), "{}", error);
    }

    #[test]
    fn should_reject_missing_root_names_at_build_time() {
        let sys = solution();
        let orchestrator = Orchestrator::with_system(sys, "tsconfig.json", None, None).unwrap();
        let error = orchestrator
            .build(Some(&[PathBuf::from("packages/missing")][..]), None, None)
            .unwrap_err();
        assert!(matches!(error, BuildError::ConfigNotFound(ref path) if path == Path::new("/repo/packages/missing/tsconfig.json")));
    }
}

mod one_shot {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn should_build_a_solution_through_its_references() {
        let sys = solution();
        let orchestrator = Orchestrator::with_system(sys.clone(), "tsconfig.json", None, None).unwrap();
        let seen = events(&orchestrator);

        let summary = orchestrator.build(None, None, None).unwrap();
        assert_eq!(
            summary,
            BuildSummary {
                projects: 2,
                generated: 2,
                ..Default::default()
            }
        );
        let projects: Vec<PathBuf> = seen
            .borrow()
            .iter()
            .filter(|e| e.kind() == BuildEventKind::BeforeProject)
            .filter_map(|e| e.project().map(Path::to_path_buf))
            .collect();
        assert_eq!(
            projects,
            vec![
                PathBuf::from("/repo/packages/shared/tsconfig.json"),
                PathBuf::from("/repo/packages/app/tsconfig.json"),
            ]
        );
        assert!(seen.borrow().iter().all(|e| e.kind() != BuildEventKind::BeforeSolution));
        assert!(sys.file_exists(Path::new("/repo/packages/shared/lib/index.js")));
        assert!(sys.file_exists(Path::new("/repo/packages/shared/lib/index.d.ts")));
        assert!(sys.file_exists(Path::new("/repo/packages/app/lib/main.js")));
    }

    #[test]
    fn should_rebuild_dependents_of_a_changed_reference_only() {
        let sys = solution();
        let orchestrator = Orchestrator::with_system(sys.clone(), "tsconfig.json", None, None).unwrap();
        orchestrator.build(None, None, None).unwrap();

        sys.write("/repo/packages/app/src/main.ts", "export const app = 2;");
        let seen = events(&orchestrator);
        let summary = orchestrator.build(None, None, None).unwrap();
        assert_eq!(summary.projects, 1);
        assert_eq!(
            seen.borrow()[0],
            BuildEvent::BeforeProject {
                project: PathBuf::from("/repo/packages/app/tsconfig.json")
            }
        );

        sys.write("/repo/packages/shared/src/index.ts", "export const shared = 'changed';");
        assert_eq!(orchestrator.build(None, None, None).unwrap().projects, 2);
    }

    #[test]
    fn should_build_only_the_requested_roots() {
        let sys = solution();
        let orchestrator = Orchestrator::with_system(sys.clone(), "tsconfig.json", None, None).unwrap();
        let summary = orchestrator
            .build(Some(&[PathBuf::from("packages/shared")][..]), None, None)
            .unwrap();
        assert_eq!(summary.projects, 1);
        assert!(!sys.file_exists(Path::new("/repo/packages/app/lib/main.js")));
    }

    #[test]
    fn should_skip_outputs_when_errors_block_emit() {
        let sys = solution();
        sys.write(
            "/repo/packages/shared/tsconfig.json",
            r#"{ "compilerOptions": { "composite": true, "outDir": "lib", "noEmitOnError": true }, "include": ["src"] }"#,
        );
        sys.write("/repo/packages/shared/src/index.ts", "export const shared: number = 'x';");
        let orchestrator = Orchestrator::with_system(sys.clone(), "tsconfig.json", None, None).unwrap();
        let seen = events(&orchestrator);

        let summary = orchestrator
            .build(None, Some(BuildOptions { stop_build_on_errors: true, ..Default::default() }), None)
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.projects, 1);
        assert!(seen.borrow().contains(&BuildEvent::OutputsSkipped {
            project: PathBuf::from("/repo/packages/shared/tsconfig.json"),
            reason: OutputsSkippedReason::DiagnosticsPresent,
        }));
        let codes: Vec<i32> = seen
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BuildEvent::Diagnostic(d) => Some(d.code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![2322, 6363]);
        assert!(!sys.file_exists(Path::new("/repo/packages/app/lib/main.js")));
    }

    #[test]
    fn should_report_progress_when_verbose() {
        let sys = solution();
        let options = BuilderOptions::default().with_build_options(BuildOptions {
            verbose: true,
            ..Default::default()
        });
        let orchestrator = Orchestrator::with_system(sys, "tsconfig.json", None, Some(options)).unwrap();
        orchestrator.build(None, None, None).unwrap();

        let seen = events(&orchestrator);
        orchestrator.build(None, None, None).unwrap();
        let codes: Vec<i32> = seen
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BuildEvent::Diagnostic(d) => Some(d.code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![6361, 6361]);
    }

    #[test]
    fn should_place_default_compiler_options_under_project_options() {
        let sys = Rc::new(InMemorySystem::new("/p"));
        sys.write("/p/tsconfig.json", r#"{ "compilerOptions": { "outDir": "out" } }"#);
        sys.write("/p/index.ts", "export const value = 1;");
        let options = BuilderOptions::default().with_compiler_options(CompilerOptions {
            declaration: Some(true),
            out_dir: Some("ignored".to_string()),
            ..Default::default()
        });
        let orchestrator = Orchestrator::with_system(sys.clone(), "tsconfig.json", None, Some(options)).unwrap();
        orchestrator.build(None, None, None).unwrap();

        assert!(sys.file_exists(Path::new("/p/out/index.d.ts")));
        assert!(!sys.file_exists(Path::new("/p/ignored/index.js")));
    }
}

mod listeners {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn should_call_once_listeners_a_single_time() {
        let sys = solution();
        let orchestrator = Orchestrator::with_system(sys, "tsconfig.json", None, None).unwrap();
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let id = orchestrator.once(BuildEventKind::AfterProject, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        orchestrator.build(None, None, None).unwrap();
        assert_eq!(*calls.borrow(), 1);
        assert!(!orchestrator.remove_listener(id));
    }

    #[test]
    fn should_stop_calling_removed_listeners() {
        let sys = solution();
        let orchestrator = Orchestrator::with_system(sys, "tsconfig.json", None, None).unwrap();
        let seen = events(&orchestrator);
        orchestrator.remove_all_listeners(Some(BuildEventKind::OutputsGenerated));

        orchestrator.build(None, None, None).unwrap();
        assert!(!seen.borrow().is_empty());
        assert!(seen
            .borrow()
            .iter()
            .all(|e| e.kind() != BuildEventKind::OutputsGenerated));

        orchestrator.remove_all_listeners(None);
        seen.borrow_mut().clear();
        orchestrator
            .build(None, Some(BuildOptions { force: true, ..Default::default() }), None)
            .unwrap();
        assert!(seen.borrow().is_empty());
    }
}

mod real_file_system {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn should_build_a_project_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("tsconfig.json"),
            r#"{ "compilerOptions": { "outDir": "dist", "declaration": true }, "include": ["src"] }"#,
        )
        .unwrap();
        fs::write(root.join("src/index.ts"), "export const answer: number = 42;\n").unwrap();

        let orchestrator = Orchestrator::new(root.join("tsconfig.json"), None, None).unwrap();
        let summary = orchestrator.build(None, None, None).unwrap();

        assert!(summary.succeeded());
        assert_eq!(summary.generated, 1);
        assert_eq!(
            fs::read_to_string(root.join("dist/index.js")).unwrap(),
            "export const answer = 42;\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("dist/index.d.ts")).unwrap(),
            "export declare const answer: number;\n"
        );
    }
}
