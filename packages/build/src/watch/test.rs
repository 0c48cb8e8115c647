// Watch Tests

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use ts::testing::InMemorySystem;
    use ts::CompilerOptions;

    use crate::logging::{LogLevel, MemoryLogger, NullLogger};
    use crate::watch::*;

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    struct Fixture {
        sys: Rc<InMemorySystem>,
        manager: WatchManager,
        changes: Rc<RefCell<Vec<PathBuf>>>,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let sys = Rc::new(InMemorySystem::new("/p"));
        for (path, text) in files {
            sys.write(path, text);
        }
        sys.discard_pending_events();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        let manager = WatchManager::new(
            sys.clone(),
            CompilerOptions::default(),
            Rc::new(move |path: &Path| sink.borrow_mut().push(path.to_path_buf())),
            Rc::new(NullLogger::new()),
        );
        Fixture { sys, manager, changes }
    }

    mod manager_tests {
        use super::*;
        use pretty_assertions::assert_eq;
        use ts::System;

        #[test]
        fn should_watch_config_wildcard_directories_and_listed_files() {
            let mut f = fixture(&[
                ("/p/tsconfig.json", r#"{ "files": ["lib/extra.ts"], "include": ["src"] }"#),
                ("/p/src/a.ts", "let a = 1;"),
                ("/p/lib/extra.ts", "let b = 1;"),
            ]);
            assert!(f.manager.watch_configuration(Path::new("/p/tsconfig.json")));
            assert_eq!(
                f.manager.watched_paths(),
                paths(&["/p/tsconfig.json", "/p/src", "/p/lib/extra.ts"])
            );
        }

        #[test]
        fn should_not_reopen_watches_for_an_unchanged_configuration() {
            let mut f = fixture(&[("/p/tsconfig.json", "{}"), ("/p/src/a.ts", "let a = 1;")]);
            f.manager.watch_configuration(Path::new("/p/tsconfig.json"));
            let first = f.manager.watched_paths();
            let opened = f.sys.watches_opened();

            f.manager.watch_configuration(Path::new("/p/tsconfig.json"));
            assert_eq!(f.manager.watched_paths(), first);
            assert_eq!(f.sys.watches_opened(), opened);
            assert_eq!(f.sys.watches_closed(), 0);
        }

        #[test]
        fn should_share_a_directory_between_recursive_and_flat_owners() {
            let mut f = fixture(&[
                ("/p/deep.json", r#"{ "include": ["src"] }"#),
                ("/p/flat.json", r#"{ "include": ["src/*"] }"#),
                ("/p/src/a.ts", "let a = 1;"),
                ("/p/src/nested/b.ts", "let b = 1;"),
                ("/p/lib/c.ts", "let c = 1;"),
            ]);
            f.manager.watch_configuration(Path::new("/p/deep.json"));
            f.manager.watch_configuration(Path::new("/p/flat.json"));
            let opened = f.sys.watches_opened();

            f.manager.watch_configuration(Path::new("/p/deep.json"));
            f.manager.watch_configuration(Path::new("/p/flat.json"));
            assert_eq!(f.sys.watches_opened(), opened);
            assert_eq!(f.sys.watches_closed(), 0);

            f.sys.write("/p/src/nested/late.ts", "let late = 1;");
            f.sys.dispatch_watch_events(Duration::ZERO);
            assert_eq!(*f.changes.borrow(), paths(&["/p/src/nested/late.ts"]));

            // Only the flat owner is left, so the watch narrows but stays.
            f.sys.write("/p/deep.json", r#"{ "include": ["lib"] }"#);
            f.manager.watch_configuration(Path::new("/p/deep.json"));
            assert!(f.manager.is_watching(Path::new("/p/src")));
            f.sys.discard_pending_events();
            f.changes.borrow_mut().clear();

            f.sys.write("/p/src/nested/e.ts", "let e = 1;");
            f.sys.write("/p/src/f.ts", "let f = 1;");
            f.sys.dispatch_watch_events(Duration::ZERO);
            assert_eq!(*f.changes.borrow(), paths(&["/p/src/f.ts"]));

            f.sys.write("/p/flat.json", r#"{ "include": ["lib"] }"#);
            f.manager.watch_configuration(Path::new("/p/flat.json"));
            assert!(!f.manager.is_watching(Path::new("/p/src")));
        }

        #[test]
        fn should_close_watches_the_configuration_no_longer_needs() {
            let mut f = fixture(&[
                ("/p/tsconfig.json", r#"{ "files": ["a.ts", "b.ts"] }"#),
                ("/p/a.ts", "let a = 1;"),
                ("/p/b.ts", "let b = 1;"),
            ]);
            f.manager.watch_configuration(Path::new("/p/tsconfig.json"));
            assert!(f.manager.is_watching(Path::new("/p/b.ts")));

            f.sys.write("/p/tsconfig.json", r#"{ "files": ["a.ts"] }"#);
            f.manager.watch_configuration(Path::new("/p/tsconfig.json"));
            assert_eq!(f.manager.watched_paths(), paths(&["/p/tsconfig.json", "/p/a.ts"]));
            assert_eq!(f.sys.watches_closed(), 1);
            assert_eq!(f.sys.open_watch_count(), 2);
        }

        #[test]
        fn should_keep_existing_watches_when_the_configuration_breaks() {
            let mut f = fixture(&[("/p/tsconfig.json", "{}"), ("/p/src/a.ts", "let a = 1;")]);
            f.manager.watch_configuration(Path::new("/p/tsconfig.json"));
            let before = f.manager.watched_paths();

            f.sys.write("/p/tsconfig.json", "{ broken");
            assert!(!f.manager.watch_configuration(Path::new("/p/tsconfig.json")));
            assert_eq!(f.manager.watched_paths(), before);
        }

        #[test]
        fn should_watch_only_the_config_file_when_it_never_parsed() {
            let logger = Rc::new(MemoryLogger::new(LogLevel::Warn));
            let sys = Rc::new(InMemorySystem::new("/p"));
            sys.write("/p/tsconfig.json", "{ broken");
            let mut manager = WatchManager::new(
                sys.clone(),
                CompilerOptions::default(),
                Rc::new(|_: &Path| {}),
                logger.clone(),
            );

            manager.watch_configuration(Path::new("/p/tsconfig.json"));
            assert_eq!(manager.watched_paths(), paths(&["/p/tsconfig.json"]));
            assert_eq!(logger.records().len(), 1);
            assert!(logger.records()[0].starts_with("warn cannot read /p/tsconfig.json"));
        }

        #[test]
        fn should_stop_idempotently_and_ignore_later_refreshes() {
            let mut f = fixture(&[("/p/tsconfig.json", "{}"), ("/p/a.ts", "let a = 1;")]);
            f.manager.watch_configuration(Path::new("/p/tsconfig.json"));
            let opened = f.sys.watches_opened();

            f.manager.stop();
            f.manager.stop();
            assert!(f.manager.is_stopped());
            assert!(f.manager.is_empty());
            assert_eq!(f.sys.watches_closed(), opened);

            assert!(!f.manager.watch_configuration(Path::new("/p/tsconfig.json")));
            assert_eq!(f.sys.open_watch_count(), 0);
        }

        #[test]
        fn should_report_relevant_changes_only() {
            let mut f = fixture(&[
                ("/p/tsconfig.json", r#"{ "compilerOptions": { "outDir": "dist", "declaration": true } }"#),
                ("/p/src/a.ts", "let a = 1;"),
            ]);
            f.manager.watch_configuration(Path::new("/p/tsconfig.json"));

            f.sys.write("/p/src/b.ts", "let b = 1;");
            f.sys.write("/p/src/notes.md", "text");
            f.sys.write("/p/dist/a.d.ts", "declare let a: number;");
            f.sys.dispatch_watch_events(Duration::ZERO);
            assert_eq!(*f.changes.borrow(), paths(&["/p/src/b.ts"]));

            f.sys.write("/p/tsconfig.json", "{}");
            f.sys.dispatch_watch_events(Duration::ZERO);
            assert_eq!(f.changes.borrow().last(), Some(&PathBuf::from("/p/tsconfig.json")));
        }
    }

    mod filter_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        fn filter(options: CompilerOptions) -> WatchFilter {
            WatchFilter::new("/p/src", options, paths(&["/p/src/a.ts"]))
        }

        #[test]
        fn should_always_rebuild_for_the_directory_itself() {
            assert!(filter(CompilerOptions::default()).should_rebuild(Path::new("/p/src")));
        }

        #[test]
        fn should_follow_the_source_extension_set() {
            let plain = filter(CompilerOptions::default());
            assert!(plain.should_rebuild(Path::new("/p/src/b.tsx")));
            assert!(!plain.should_rebuild(Path::new("/p/src/b.jsx")));
            assert!(!plain.should_rebuild(Path::new("/p/src/data.json")));

            let wide = filter(CompilerOptions {
                allow_js: Some(true),
                resolve_json_module: Some(true),
                ..CompilerOptions::default()
            });
            assert!(wide.should_rebuild(Path::new("/p/src/b.jsx")));
            assert!(wide.should_rebuild(Path::new("/p/src/data.json")));
        }

        #[test]
        fn should_ignore_compiler_outputs() {
            let siblings = filter(CompilerOptions {
                declaration: Some(true),
                ..CompilerOptions::default()
            });
            assert!(!siblings.should_rebuild(Path::new("/p/src/a.d.ts")));
            assert!(siblings.should_rebuild(Path::new("/p/src/types.d.ts")));

            let out_dir = filter(CompilerOptions {
                out_dir: Some("/p/src/out".to_string()),
                ..CompilerOptions::default()
            });
            assert!(!out_dir.should_rebuild(Path::new("/p/src/out/a.d.ts")));
        }

        #[test]
        fn should_list_extensions_by_options() {
            assert_eq!(
                source_extensions(&CompilerOptions::default()).as_slice(),
                &[".ts", ".tsx", ".d.ts"]
            );
        }
    }
}
