// Solution Builder
//
// Incremental multi-project planner. Computes a build order over project
// references and hands out one invalidated project at a time; completing a
// project with `done` compiles and emits it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;

use crate::config::{parse_config_file, ParsedCommandLine};
use crate::diagnostics::{self, create_compiler_diagnostic};
use crate::emitter::all_output_paths;
use crate::error::{Error, Result};
use crate::path::resolve;
use crate::program::{CompilerOptions, Program, WriteFileCallback};
use crate::sys::System;
use crate::transformer::CustomTransformers;
use crate::{has_errors, Diagnostic};

/// Per-project outcome of `InvalidatedProject::done`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    pub const DIAGNOSTICS_PRESENT_OUTPUTS_SKIPPED: ExitStatus = ExitStatus(1);
    pub const DIAGNOSTICS_PRESENT_OUTPUTS_GENERATED: ExitStatus = ExitStatus(2);
    pub const INVALID_PROJECT_OUTPUTS_SKIPPED: ExitStatus = ExitStatus(3);
    pub const PROJECT_REFERENCE_CYCLE_OUTPUTS_SKIPPED: ExitStatus = ExitStatus(4);
    /// Historical spelling, kept for compatibility.
    pub const PROJECT_REFERENCE_CYCLE_OUTPUTS_SKUPPED: ExitStatus = ExitStatus(4);

    fn name(self) -> Option<&'static str> {
        match self {
            ExitStatus::SUCCESS => Some("Success"),
            ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_SKIPPED => Some("DiagnosticsPresent_OutputsSkipped"),
            ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_GENERATED => Some("DiagnosticsPresent_OutputsGenerated"),
            ExitStatus::INVALID_PROJECT_OUTPUTS_SKIPPED => Some("InvalidProject_OutputsSkipped"),
            ExitStatus::PROJECT_REFERENCE_CYCLE_OUTPUTS_SKIPPED => Some("ProjectReferenceCycle_OutputsSkipped"),
            _ => None,
        }
    }
}

impl fmt::Debug for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "ExitStatus({})", self.0),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Rebuild every project regardless of up-to-date status.
    pub force: bool,
    /// Report status messages for every project.
    pub verbose: bool,
    /// Skip projects whose references reported errors this session.
    pub stop_build_on_errors: bool,
}

/// Cooperative cancellation flag, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn throw_if_cancellation_requested(&self) -> Result<()> {
        if self.is_cancellation_requested() {
            Err(Error::OperationCanceled)
        } else {
            Ok(())
        }
    }
}

fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    token.map_or(Ok(()), CancellationToken::throw_if_cancellation_requested)
}

pub type DiagnosticReporter = Rc<dyn Fn(&Diagnostic)>;

/// What the planner found wrong with a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidatedProjectKind {
    /// Out of date; `done` compiles and emits it.
    Build,
    /// Its configuration could not be used.
    InvalidConfig,
    /// It is part of a reference cycle.
    ReferenceCycle,
}

/// Results shared between the planner and the projects it handed out.
#[derive(Default)]
struct SessionState {
    rebuilt: HashSet<PathBuf>,
    failed: HashSet<PathBuf>,
}

pub struct SolutionBuilder {
    sys: Rc<dyn System>,
    root_names: Vec<PathBuf>,
    default_options: CompilerOptions,
    build_options: BuildOptions,
    reporter: DiagnosticReporter,
    configs: IndexMap<PathBuf, std::result::Result<ParsedCommandLine, Diagnostic>>,
    build_order: Option<Vec<PathBuf>>,
    cycles: IndexMap<PathBuf, Vec<PathBuf>>,
    cursor: usize,
    state: Rc<RefCell<SessionState>>,
}

impl SolutionBuilder {
    pub fn new(
        sys: Rc<dyn System>,
        root_names: Vec<PathBuf>,
        default_options: CompilerOptions,
        build_options: BuildOptions,
        reporter: DiagnosticReporter,
    ) -> Self {
        let cwd = sys.get_current_directory();
        let root_names = root_names
            .into_iter()
            .map(|name| resolve_config_path(&cwd, &name))
            .collect();
        Self {
            sys,
            root_names,
            default_options,
            build_options,
            reporter,
            configs: IndexMap::new(),
            build_order: None,
            cycles: IndexMap::new(),
            cursor: 0,
            state: Rc::new(RefCell::new(SessionState::default())),
        }
    }

    /// Parsed configuration of a project in the build, read once per planner.
    pub fn parsed_config(&mut self, project: &Path) -> std::result::Result<&ParsedCommandLine, &Diagnostic> {
        if !self.configs.contains_key(project) {
            let parsed = parse_config_file(project, Some(&self.default_options), self.sys.as_ref());
            self.configs.insert(project.to_path_buf(), parsed);
        }
        match &self.configs[project] {
            Ok(parsed) => Ok(parsed),
            Err(diagnostic) => Err(diagnostic),
        }
    }

    /// Projects in build order: references before the projects that use them.
    pub fn build_order(&mut self) -> Vec<PathBuf> {
        if let Some(order) = &self.build_order {
            return order.clone();
        }
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for root in self.root_names.clone() {
            self.visit(&root, &mut visited, &mut stack, &mut order);
        }
        self.build_order = Some(order.clone());
        order
    }

    fn visit(
        &mut self,
        project: &Path,
        visited: &mut HashSet<PathBuf>,
        stack: &mut Vec<PathBuf>,
        order: &mut Vec<PathBuf>,
    ) {
        if visited.contains(project) {
            return;
        }
        if let Some(start) = stack.iter().position(|p| p == project) {
            let cycle: Vec<PathBuf> = stack[start..].to_vec();
            for member in &cycle {
                self.cycles.insert(member.clone(), cycle.clone());
            }
            return;
        }

        stack.push(project.to_path_buf());
        let references: Vec<PathBuf> = match self.parsed_config(project) {
            Ok(parsed) => parsed.project_references.iter().map(|r| r.path.clone()).collect(),
            Err(_) => Vec::new(),
        };
        for reference in references {
            self.visit(&reference, visited, stack, order);
        }
        stack.pop();
        visited.insert(project.to_path_buf());
        order.push(project.to_path_buf());
    }

    /// The next project that needs work, or `None` when the build is complete.
    pub fn get_next_invalidated_project(
        &mut self,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Option<InvalidatedProject>> {
        let order = self.build_order();
        while self.cursor < order.len() {
            check_cancelled(cancellation)?;
            let project = order[self.cursor].clone();
            self.cursor += 1;

            if let Some(cycle) = self.cycles.get(&project) {
                return Ok(Some(self.invalidated(project.clone(), InvalidatedProjectKind::ReferenceCycle, None, cycle.clone())));
            }

            let parsed = match self.parsed_config(&project) {
                Ok(parsed) => parsed.clone(),
                Err(diagnostic) => {
                    let diagnostic = diagnostic.clone();
                    let mut unit = self.invalidated(project, InvalidatedProjectKind::InvalidConfig, None, Vec::new());
                    unit.config_errors.push(diagnostic);
                    return Ok(Some(unit));
                }
            };

            if !parsed.errors.is_empty() {
                let mut unit =
                    self.invalidated(project, InvalidatedProjectKind::InvalidConfig, Some(parsed.clone()), Vec::new());
                unit.config_errors = parsed.errors;
                return Ok(Some(unit));
            }

            // A container of references has nothing of its own to build.
            if parsed.file_names.is_empty() {
                continue;
            }

            if self.build_options.stop_build_on_errors {
                let failed_reference = {
                    let state = self.state.borrow();
                    parsed
                        .project_references
                        .iter()
                        .find(|r| state.failed.contains(&r.path))
                        .map(|r| r.path.clone())
                };
                if let Some(reference) = failed_reference {
                    (self.reporter)(&create_compiler_diagnostic(
                        diagnostics::SKIPPING_BUILD_REFERENCE_HAS_ERRORS,
                        &[&project.to_string_lossy(), &reference.to_string_lossy()],
                    ));
                    self.state.borrow_mut().failed.insert(project);
                    continue;
                }
            }

            if !self.build_options.force && self.is_up_to_date(&parsed) {
                if self.build_options.verbose {
                    (self.reporter)(&create_compiler_diagnostic(
                        diagnostics::PROJECT_UP_TO_DATE,
                        &[&project.to_string_lossy()],
                    ));
                }
                continue;
            }

            return Ok(Some(self.invalidated(project, InvalidatedProjectKind::Build, Some(parsed), Vec::new())));
        }
        Ok(None)
    }

    fn invalidated(
        &self,
        project: PathBuf,
        kind: InvalidatedProjectKind,
        parsed: Option<ParsedCommandLine>,
        cycle: Vec<PathBuf>,
    ) -> InvalidatedProject {
        InvalidatedProject {
            project,
            kind,
            parsed,
            cycle,
            config_errors: Vec::new(),
            sys: self.sys.clone(),
            reporter: self.reporter.clone(),
            verbose: self.build_options.verbose,
            state: self.state.clone(),
        }
    }

    /// Outputs exist and are newer than the inputs, the config and the
    /// outputs of every reference, and no reference was rebuilt in this
    /// session.
    fn is_up_to_date(&self, parsed: &ParsedCommandLine) -> bool {
        let state = self.state.borrow();
        if parsed
            .project_references
            .iter()
            .any(|r| state.rebuilt.contains(&r.path) || state.failed.contains(&r.path))
        {
            return false;
        }

        let outputs = all_output_paths(&parsed.options, &parsed.file_names);
        if outputs.is_empty() {
            return false;
        }
        let mut oldest_output: Option<SystemTime> = None;
        for output in &outputs {
            match self.sys.get_modified_time(output) {
                Some(time) => oldest_output = Some(oldest_output.map_or(time, |t| t.min(time))),
                None => return false,
            }
        }

        let mut newest_input: Option<SystemTime> = self.sys.get_modified_time(&parsed.config_file_path);
        for input in &parsed.file_names {
            match self.sys.get_modified_time(input) {
                Some(time) => newest_input = Some(newest_input.map_or(time, |t| t.max(time))),
                None => return false,
            }
        }
        // References rebuilt by an earlier session.
        let newest_reference = parsed
            .project_references
            .iter()
            .filter_map(|r| self.newest_output(&r.path))
            .max();
        match (oldest_output, newest_input) {
            (Some(output), Some(input)) => output >= input && newest_reference.map_or(true, |r| output >= r),
            _ => false,
        }
    }

    fn newest_output(&self, project: &Path) -> Option<SystemTime> {
        let Some(Ok(parsed)) = self.configs.get(project) else {
            return None;
        };
        all_output_paths(&parsed.options, &parsed.file_names)
            .iter()
            .filter_map(|output| self.sys.get_modified_time(output))
            .max()
    }
}

/// Resolve a root name to a configuration file path; directories get
/// `tsconfig.json` appended.
pub fn resolve_config_path(cwd: &Path, name: &Path) -> PathBuf {
    let path = resolve(cwd, name);
    if crate::path::extension_of(&path).as_deref() == Some(".json") {
        path
    } else {
        path.join("tsconfig.json")
    }
}

/// One project that needs work. Completing it with `done` consumes it.
pub struct InvalidatedProject {
    project: PathBuf,
    kind: InvalidatedProjectKind,
    parsed: Option<ParsedCommandLine>,
    cycle: Vec<PathBuf>,
    config_errors: Vec<Diagnostic>,
    sys: Rc<dyn System>,
    reporter: DiagnosticReporter,
    verbose: bool,
    state: Rc<RefCell<SessionState>>,
}

impl fmt::Debug for InvalidatedProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidatedProject")
            .field("project", &self.project)
            .field("kind", &self.kind)
            .finish()
    }
}

impl InvalidatedProject {
    /// Path of the project's configuration file.
    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn kind(&self) -> InvalidatedProjectKind {
        self.kind
    }

    pub fn parsed_config(&self) -> Option<&ParsedCommandLine> {
        self.parsed.as_ref()
    }

    pub fn compiler_options(&self) -> Option<&CompilerOptions> {
        self.parsed.as_ref().map(|p| &p.options)
    }

    fn report(&self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            (self.reporter)(diagnostic);
        }
    }

    /// Compile and emit the project, reporting its diagnostics.
    ///
    /// Without a `writer`, outputs go to the system. Cancellation and
    /// transformer failures are errors.
    pub fn done(
        self,
        cancellation: Option<&CancellationToken>,
        writer: Option<&mut WriteFileCallback<'_>>,
        custom_transformers: Option<&CustomTransformers>,
    ) -> Result<ExitStatus> {
        check_cancelled(cancellation)?;

        match self.kind {
            InvalidatedProjectKind::ReferenceCycle => {
                let cycle: Vec<String> = self.cycle.iter().map(|p| p.to_string_lossy().into_owned()).collect();
                self.report(&[create_compiler_diagnostic(
                    diagnostics::PROJECT_REFERENCE_CYCLE,
                    &[&cycle.join("\n")],
                )]);
                self.state.borrow_mut().failed.insert(self.project.clone());
                Ok(ExitStatus::PROJECT_REFERENCE_CYCLE_OUTPUTS_SKIPPED)
            }
            InvalidatedProjectKind::InvalidConfig => {
                self.report(&self.config_errors);
                self.state.borrow_mut().failed.insert(self.project.clone());
                Ok(ExitStatus::INVALID_PROJECT_OUTPUTS_SKIPPED)
            }
            InvalidatedProjectKind::Build => self.build(cancellation, writer, custom_transformers),
        }
    }

    fn build(
        self,
        cancellation: Option<&CancellationToken>,
        writer: Option<&mut WriteFileCallback<'_>>,
        custom_transformers: Option<&CustomTransformers>,
    ) -> Result<ExitStatus> {
        let Some(parsed) = &self.parsed else {
            return Ok(ExitStatus::INVALID_PROJECT_OUTPUTS_SKIPPED);
        };
        if self.verbose {
            self.report(&[create_compiler_diagnostic(
                diagnostics::BUILDING_PROJECT,
                &[&self.project.to_string_lossy()],
            )]);
        }

        let program = Program::create(&parsed.file_names, &parsed.options, self.sys.as_ref());
        let mut reported = program.all_diagnostics();
        self.report(&reported);
        check_cancelled(cancellation)?;

        let sys = self.sys.clone();
        let mut write_to_system = move |path: &Path, text: &str| sys.write_file(path, text);
        let writer: &mut WriteFileCallback<'_> = match writer {
            Some(writer) => writer,
            None => &mut write_to_system,
        };
        let emit = program.emit(writer, custom_transformers)?;
        self.report(&emit.diagnostics);
        reported.extend(emit.diagnostics.iter().cloned());

        let errors = has_errors(&reported);
        let mut state = self.state.borrow_mut();
        if !emit.emitted_files.is_empty() {
            state.rebuilt.insert(self.project.clone());
        }
        if errors {
            state.failed.insert(self.project.clone());
        }

        Ok(match (errors, emit.emit_skipped) {
            (false, _) => ExitStatus::SUCCESS,
            (true, true) => ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_SKIPPED,
            (true, false) => ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_GENERATED,
        })
    }
}
