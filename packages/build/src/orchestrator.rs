// Build Orchestrator
//
// Drives the host planner unit by unit with the registered passes attached
// and republishes what happens as build events. Watch mode keeps the
// watches of every project in the build order and starts a fresh pass
// whenever one of them reports a relevant change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use ts::{
    format_diagnostics, parse_config_file, resolve_config_path, BuildOptions, CancellationToken,
    Diagnostic, DiagnosticReporter, FormatDiagnosticsHost, InvalidatedProject, RealSystem,
    SolutionBuilder, System,
};

use crate::error::{BuildError, Result};
use crate::events::{BuildEvent, BuildEventKind, EventEmitter, ListenerId, Solution};
use crate::logging::Logger;
use crate::options::BuilderOptions;
use crate::transform::{TransformRegistry, TransformUnit};
use crate::units::{classify, BuildUnits, ProjectOutcome, UnitStep};
use crate::watch::WatchManager;

/// How long `WatchHandle::run` waits for changes per turn.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Listener failure raised while the planner was reporting a diagnostic.
type DeferredError = Rc<RefCell<Option<anyhow::Error>>>;

/// Totals of one build pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Units that ran to completion.
    pub projects: usize,
    pub generated: usize,
    pub skipped: usize,
    /// Error diagnostics reported during the pass.
    pub errors: usize,
    pub cancelled: bool,
}

impl BuildSummary {
    pub fn succeeded(&self) -> bool {
        self.errors == 0 && !self.cancelled
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    config_path: PathBuf,
    registry: Rc<TransformRegistry>,
    options: BuilderOptions,
    sys: Rc<dyn System>,
    events: Rc<EventEmitter>,
    logger: Rc<dyn Logger>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config_path", &self.config_path)
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator over the real file system.
    ///
    /// Fails when `config_path` does not name an existing config file.
    pub fn new(
        config_path: impl AsRef<Path>,
        registry: Option<TransformRegistry>,
        options: Option<BuilderOptions>,
    ) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let config_path = ts::path::resolve(&cwd, config_path);
        Self::with_system(Rc::new(RealSystem::new()), config_path, registry, options)
    }

    pub fn with_system(
        sys: Rc<dyn System>,
        config_path: impl AsRef<Path>,
        registry: Option<TransformRegistry>,
        options: Option<BuilderOptions>,
    ) -> Result<Self> {
        let config_path = resolve_config_path(&sys.get_current_directory(), config_path.as_ref());
        if !sys.file_exists(&config_path) {
            return Err(BuildError::ConfigNotFound(config_path));
        }
        let options = options.unwrap_or_default();
        let logger = options.logger();
        Ok(Self {
            config_path,
            registry: Rc::new(registry.unwrap_or_default()),
            options,
            sys,
            events: Rc::new(EventEmitter::new()),
            logger,
        })
    }

    pub fn with_logger(mut self, logger: Rc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn system(&self) -> &Rc<dyn System> {
        &self.sys
    }

    pub fn on<F>(&self, kind: BuildEventKind, listener: F) -> ListenerId
    where
        F: Fn(&BuildEvent) -> anyhow::Result<()> + 'static,
    {
        self.events.on(kind, listener)
    }

    pub fn once<F>(&self, kind: BuildEventKind, listener: F) -> ListenerId
    where
        F: Fn(&BuildEvent) -> anyhow::Result<()> + 'static,
    {
        self.events.once(kind, listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    pub fn remove_all_listeners(&self, kind: Option<BuildEventKind>) {
        self.events.remove_all_listeners(kind)
    }

    /// Diagnostics as `file(line,col): error TS1234: message` lines, paths
    /// relative to the current directory.
    pub fn format_diagnostics(&self, diagnostics: &[Diagnostic]) -> String {
        format_diagnostics(diagnostics, &SystemFormatHost(self.sys.as_ref()))
    }

    /// Build every out-of-date project once.
    ///
    /// `root_names` defaults to the orchestrator's config path and
    /// `build_options` to the ones given at construction. A root whose
    /// configuration is missing or unreadable is an error; every other
    /// problem is reported as a `Diagnostic` event.
    pub fn build(
        &self,
        root_names: Option<&[PathBuf]>,
        build_options: Option<BuildOptions>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<BuildSummary> {
        let roots = self.root_names(root_names);
        for root in &roots {
            if !self.sys.file_exists(root) {
                return Err(BuildError::ConfigNotFound(root.clone()));
            }
            parse_config_file(root, Some(&self.options.compiler_options), self.sys.as_ref())
                .map_err(BuildError::Config)?;
        }
        self.run_pass(&roots, build_options, cancellation, None)
            .map(|(_, summary)| summary)
    }

    /// Build once, then keep watching. Later passes run from
    /// [`WatchHandle::poll`] or [`WatchHandle::run`].
    pub fn watch(
        &self,
        root_names: Option<&[PathBuf]>,
        build_options: Option<BuildOptions>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<WatchHandle> {
        let changed: Rc<RefCell<Vec<PathBuf>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = changed.clone();
        let manager = WatchManager::new(
            self.sys.clone(),
            self.options.compiler_options.clone(),
            Rc::new(move |path: &Path| sink.borrow_mut().push(path.to_path_buf())),
            self.logger.clone(),
        );
        let mut handle = WatchHandle {
            orchestrator: self.clone(),
            roots: self.root_names(root_names),
            build_options,
            cancellation: cancellation.cloned(),
            manager,
            changed,
            stopped: false,
            last_summary: BuildSummary::default(),
        };
        handle.run_watch_pass()?;
        Ok(handle)
    }

    fn root_names(&self, root_names: Option<&[PathBuf]>) -> Vec<PathBuf> {
        let cwd = self.sys.get_current_directory();
        match root_names {
            Some(names) if !names.is_empty() => names.iter().map(|name| resolve_config_path(&cwd, name)).collect(),
            _ => vec![self.config_path.clone()],
        }
    }

    fn emit(&self, event: BuildEvent) -> Result<()> {
        self.events.emit(&event).map_err(BuildError::Listener)
    }

    /// Forwards planner diagnostics as events and counts the errors.
    fn reporter(&self, errors: Rc<Cell<usize>>, deferred: DeferredError) -> DiagnosticReporter {
        let events = self.events.clone();
        Rc::new(move |diagnostic: &Diagnostic| {
            if diagnostic.is_error() {
                errors.set(errors.get() + 1);
            }
            if deferred.borrow().is_some() {
                return;
            }
            if let Err(error) = events.emit(&BuildEvent::Diagnostic(diagnostic.clone())) {
                *deferred.borrow_mut() = Some(error);
            }
        })
    }

    /// One pass over a fresh planner. With a watch manager the pass is
    /// bracketed as a solution and `BeforeSolution` is emitted here.
    fn run_pass(
        &self,
        roots: &[PathBuf],
        build_options: Option<BuildOptions>,
        cancellation: Option<&CancellationToken>,
        mut watch: Option<&mut WatchManager>,
    ) -> Result<(Solution, BuildSummary)> {
        let errors = Rc::new(Cell::new(0));
        let deferred: DeferredError = Rc::new(RefCell::new(None));
        let mut planner = SolutionBuilder::new(
            self.sys.clone(),
            roots.to_vec(),
            self.options.compiler_options.clone(),
            build_options.unwrap_or(self.options.build_options),
            self.reporter(errors.clone(), deferred.clone()),
        );

        let solution = Solution {
            roots: roots.to_vec(),
            build_order: planner.build_order(),
        };
        if let Some(manager) = watch.as_deref_mut() {
            self.emit(BuildEvent::BeforeSolution {
                solution: solution.clone(),
            })?;
            for project in &solution.build_order {
                manager.watch_configuration(project);
            }
        }

        let summary = BuildUnits::new(&mut planner, cancellation).try_fold(
            BuildSummary::default(),
            |mut summary, step| -> Result<BuildSummary> {
                take_deferred(&deferred)?;
                let project = match step? {
                    UnitStep::Cancelled => {
                        summary.cancelled = true;
                        return Ok(summary);
                    }
                    UnitStep::Unit(project) => project,
                };
                let path = project.project().to_path_buf();
                match self.run_unit(project, cancellation, &deferred)? {
                    Some(outcome) => {
                        summary.projects += 1;
                        match outcome {
                            ProjectOutcome::OutputsGenerated => summary.generated += 1,
                            ProjectOutcome::OutputsSkipped(_) => summary.skipped += 1,
                        }
                        if let Some(manager) = watch.as_deref_mut() {
                            manager.watch_configuration(&path);
                        }
                    }
                    None => summary.cancelled = true,
                }
                Ok(summary)
            },
        )?;
        take_deferred(&deferred)?;

        let summary = BuildSummary {
            errors: errors.get(),
            ..summary
        };
        self.logger.debug(&format!(
            "pass finished: {} built, {} generated, {} skipped, {} errors",
            summary.projects, summary.generated, summary.skipped, summary.errors
        ));
        Ok((solution, summary))
    }

    /// Complete one unit. `None` means cancellation stopped it.
    fn run_unit(
        &self,
        project: InvalidatedProject,
        cancellation: Option<&CancellationToken>,
        deferred: &DeferredError,
    ) -> Result<Option<ProjectOutcome>> {
        let path = project.project().to_path_buf();
        self.logger
            .debug(&format!("building {} ({:?})", path.display(), project.kind()));
        self.emit(BuildEvent::BeforeProject { project: path.clone() })?;

        let unit = TransformUnit::new(path.clone(), self.sys.get_current_directory());
        let transformers = self.registry.materialize(&unit);
        let result = project.done(cancellation, None, Some(&transformers));
        take_deferred(deferred)?;
        let status = match result {
            Ok(status) => status,
            Err(error) if error.is_cancellation() => {
                self.logger.debug(&format!("cancelled while building {}", path.display()));
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };

        let outcome = classify(status)?;
        match outcome {
            ProjectOutcome::OutputsGenerated => self.emit(BuildEvent::OutputsGenerated { project: path.clone() })?,
            ProjectOutcome::OutputsSkipped(reason) => self.emit(BuildEvent::OutputsSkipped {
                project: path.clone(),
                reason,
            })?,
        }
        self.emit(BuildEvent::AfterProject { project: path })?;
        Ok(Some(outcome))
    }
}

fn take_deferred(deferred: &DeferredError) -> Result<()> {
    match deferred.borrow_mut().take() {
        Some(error) => Err(BuildError::Listener(error)),
        None => Ok(()),
    }
}

struct SystemFormatHost<'a>(&'a dyn System);

impl FormatDiagnosticsHost for SystemFormatHost<'_> {
    fn get_current_directory(&self) -> String {
        self.0.get_current_directory().to_string_lossy().into_owned()
    }

    fn get_new_line(&self) -> String {
        self.0.new_line().to_string()
    }
}

/// A running watch. Dropping it stops the watches.
pub struct WatchHandle {
    orchestrator: Orchestrator,
    roots: Vec<PathBuf>,
    build_options: Option<BuildOptions>,
    cancellation: Option<CancellationToken>,
    manager: WatchManager,
    changed: Rc<RefCell<Vec<PathBuf>>>,
    stopped: bool,
    last_summary: BuildSummary,
}

impl WatchHandle {
    /// Deliver pending change notifications, waiting up to `timeout`, and
    /// run a pass if any of them was relevant.
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<BuildSummary>> {
        if self.stopped || self.is_cancelled() {
            return Ok(None);
        }
        self.orchestrator.sys.dispatch_watch_events(timeout);
        let changed: Vec<PathBuf> = self.changed.borrow_mut().drain(..).collect();
        let Some(first) = changed.first() else {
            return Ok(None);
        };
        self.orchestrator.logger.info(&format!(
            "change detected in {}, starting incremental build",
            first.display()
        ));
        self.run_watch_pass().map(Some)
    }

    /// Poll until stopped or cancelled.
    pub fn run(&mut self) -> Result<()> {
        while !self.stopped && !self.is_cancelled() {
            self.poll(POLL_INTERVAL)?;
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.manager.stop();
        self.orchestrator.logger.debug("watch stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.manager.watched_paths()
    }

    pub fn last_summary(&self) -> &BuildSummary {
        &self.last_summary
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, CancellationToken::is_cancellation_requested)
    }

    fn run_watch_pass(&mut self) -> Result<BuildSummary> {
        let orchestrator = &self.orchestrator;
        let error_count = Rc::new(Cell::new(0usize));
        let counter = error_count.clone();
        let listener = orchestrator.events.on(BuildEventKind::Diagnostic, move |event| {
            if matches!(event, BuildEvent::Diagnostic(diagnostic) if diagnostic.is_error()) {
                counter.set(counter.get() + 1);
            }
            Ok(())
        });

        let result = orchestrator
            .run_pass(
                &self.roots,
                self.build_options,
                self.cancellation.as_ref(),
                Some(&mut self.manager),
            )
            .and_then(|(solution, summary)| {
                if !summary.cancelled {
                    orchestrator.emit(BuildEvent::AfterSolution {
                        solution,
                        error_count: error_count.get(),
                    })?;
                }
                Ok(summary)
            });
        orchestrator.events.remove_listener(listener);

        let summary = result?;
        self.last_summary = summary;
        Ok(summary)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::OutputsSkippedReason;
    use pretty_assertions::assert_eq;
    use ts::testing::InMemorySystem;

    fn two_projects() -> Rc<InMemorySystem> {
        let sys = Rc::new(InMemorySystem::new("/p"));
        sys.write("/p/core/tsconfig.json", r#"{ "compilerOptions": { "composite": true } }"#);
        sys.write("/p/core/index.ts", "export const core = 1;");
        sys.write("/p/app/tsconfig.json", r#"{ "references": [{ "path": "../core" }] }"#);
        sys.write("/p/app/main.ts", "export const app = 2;");
        sys
    }

    fn orchestrator(sys: &Rc<InMemorySystem>, config: &str) -> Orchestrator {
        Orchestrator::with_system(sys.clone(), config, None, None).unwrap()
    }

    /// Records `kind project` for every event.
    fn record(orchestrator: &Orchestrator) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in BuildEventKind::ALL {
            let log = log.clone();
            orchestrator.on(kind, move |event| {
                let line = match event {
                    BuildEvent::Diagnostic(d) => format!("{} {}", event.kind(), d.code),
                    BuildEvent::AfterSolution { error_count, .. } => format!("{} {}", event.kind(), error_count),
                    BuildEvent::OutputsSkipped { project, reason } => {
                        format!("{} {} {:?}", event.kind(), project.display(), reason)
                    }
                    _ => match event.project() {
                        Some(project) => format!("{} {}", event.kind(), project.display()),
                        None => event.kind().to_string(),
                    },
                };
                log.borrow_mut().push(line);
                Ok(())
            });
        }
        log
    }

    #[test]
    fn should_fail_fast_for_a_missing_config() {
        let sys = Rc::new(InMemorySystem::new("/p"));
        let error = Orchestrator::with_system(sys, "missing/tsconfig.json", None, None).unwrap_err();
        assert!(matches!(error, BuildError::ConfigNotFound(_)));
        assert!(error.to_string().contains("does not exist"));
    }

    #[test]
    fn should_resolve_directories_to_their_tsconfig() {
        let sys = two_projects();
        assert_eq!(orchestrator(&sys, "app").config_path(), Path::new("/p/app/tsconfig.json"));
    }

    #[test]
    fn should_emit_project_events_in_planner_order() {
        let sys = two_projects();
        let orchestrator = orchestrator(&sys, "app");
        let log = record(&orchestrator);

        let summary = orchestrator.build(None, None, None).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "beforeProject /p/core/tsconfig.json",
                "outputsGenerated /p/core/tsconfig.json",
                "afterProject /p/core/tsconfig.json",
                "beforeProject /p/app/tsconfig.json",
                "outputsGenerated /p/app/tsconfig.json",
                "afterProject /p/app/tsconfig.json",
            ]
        );
        assert_eq!(
            summary,
            BuildSummary {
                projects: 2,
                generated: 2,
                ..Default::default()
            }
        );
        assert!(sys.file_exists(Path::new("/p/app/main.js")));

        log.borrow_mut().clear();
        let again = orchestrator.build(None, None, None).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(again.projects, 0);

        let forced = orchestrator
            .build(None, Some(BuildOptions { force: true, ..Default::default() }), None)
            .unwrap();
        assert_eq!(forced.generated, 2);
    }

    #[test]
    fn should_route_diagnostics_through_events() {
        let sys = two_projects();
        sys.write("/p/core/index.ts", "export const core: number = 'x';");
        let orchestrator = orchestrator(&sys, "core");
        let log = record(&orchestrator);

        let summary = orchestrator.build(None, None, None).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "beforeProject /p/core/tsconfig.json",
                "diagnostic 2322",
                "outputsGenerated /p/core/tsconfig.json",
                "afterProject /p/core/tsconfig.json",
            ]
        );
        assert_eq!(summary.errors, 1);
        assert!(!summary.succeeded());
    }

    #[test]
    fn should_skip_outputs_of_invalid_references() {
        let sys = two_projects();
        sys.write("/p/core/tsconfig.json", "{ broken");
        let orchestrator = orchestrator(&sys, "app");
        let log = record(&orchestrator);

        let summary = orchestrator.build(None, None, None).unwrap();
        assert_eq!(log.borrow()[0], "beforeProject /p/core/tsconfig.json");
        assert!(log
            .borrow()
            .contains(&"outputsSkipped /p/core/tsconfig.json InvalidProject".to_string()));
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.generated, 1);
    }

    #[test]
    fn should_reject_an_unreadable_root_config() {
        let sys = two_projects();
        sys.write("/p/app/tsconfig.json", "{ broken");
        let orchestrator = orchestrator(&sys, "app");
        let error = orchestrator.build(None, None, None).unwrap_err();
        assert!(matches!(error, BuildError::Config(ref d) if d.code == 5014));
    }

    #[test]
    fn should_stop_when_a_listener_fails() {
        let sys = two_projects();
        let orchestrator = orchestrator(&sys, "app");
        orchestrator.on(BuildEventKind::BeforeProject, |_| Err(anyhow::anyhow!("boom")));

        let error = orchestrator.build(None, None, None).unwrap_err();
        assert_eq!(error.to_string(), "event listener failed: boom");
        assert!(!sys.file_exists(Path::new("/p/core/index.js")));
    }

    #[test]
    fn should_surface_diagnostic_listener_failures() {
        let sys = two_projects();
        sys.write("/p/core/index.ts", "export const core: number = 'x';");
        let orchestrator = orchestrator(&sys, "core");
        orchestrator.once(BuildEventKind::Diagnostic, |_| Err(anyhow::anyhow!("no diagnostics please")));

        let error = orchestrator.build(None, None, None).unwrap_err();
        assert!(matches!(error, BuildError::Listener(_)));
    }

    #[test]
    fn should_stop_advancing_once_cancelled() {
        let sys = two_projects();
        let orchestrator = orchestrator(&sys, "app");
        let log = record(&orchestrator);
        let token = CancellationToken::new();
        let cancel = token.clone();
        orchestrator.once(BuildEventKind::AfterProject, move |_| {
            cancel.cancel();
            Ok(())
        });

        let summary = orchestrator.build(None, None, Some(&token)).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.projects, 1);
        assert!(!log.borrow().iter().any(|line| line.contains("/p/app/")));
    }

    #[test]
    fn should_map_reference_cycles_to_skipped_outputs() {
        let sys = Rc::new(InMemorySystem::new("/p"));
        sys.write("/p/a/tsconfig.json", r#"{ "references": [{ "path": "../b" }] }"#);
        sys.write("/p/a/a.ts", "let a = 1;");
        sys.write("/p/b/tsconfig.json", r#"{ "references": [{ "path": "../a" }] }"#);
        sys.write("/p/b/b.ts", "let b = 1;");
        let orchestrator = orchestrator(&sys, "a");
        let log = record(&orchestrator);

        let summary = orchestrator.build(None, None, None).unwrap();
        assert_eq!(summary.skipped, 2);
        let reasons = log
            .borrow()
            .iter()
            .filter(|line| line.ends_with(&format!("{:?}", OutputsSkippedReason::ProjectReferenceCycle)))
            .count();
        assert_eq!(reasons, 2);
    }

    #[test]
    fn should_format_diagnostics_relative_to_the_current_directory() {
        let sys = two_projects();
        let orchestrator = orchestrator(&sys, "app");
        let diagnostic = Diagnostic::new(ts::DiagnosticCategory::Error, 2322, "Type mismatch.")
            .with_span("/p/app/main.ts", "export const app = 2;", 13, 3);
        assert_eq!(
            orchestrator.format_diagnostics(&[diagnostic]),
            "app/main.ts(1,14): error TS2322: Type mismatch.\n"
        );
    }
}
