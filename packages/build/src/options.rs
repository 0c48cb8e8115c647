// Builder Options

use std::rc::Rc;

use ts::{BuildOptions, CompilerOptions};

use crate::logging::{ConsoleLogger, LogLevel, Logger, NullLogger};

/// Orchestrator settings, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    /// Defaults placed under every project's own `compilerOptions`.
    pub compiler_options: CompilerOptions,
    /// Planner settings used when `build`/`watch` are given none.
    pub build_options: BuildOptions,
    /// Console log threshold; `None` keeps the orchestrator silent.
    pub log_level: Option<LogLevel>,
}

impl BuilderOptions {
    pub fn with_compiler_options(mut self, compiler_options: CompilerOptions) -> Self {
        self.compiler_options = compiler_options;
        self
    }

    pub fn with_build_options(mut self, build_options: BuildOptions) -> Self {
        self.build_options = build_options;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub(crate) fn logger(&self) -> Rc<dyn Logger> {
        match self.log_level {
            Some(level) => Rc::new(ConsoleLogger::new(level)),
            None => Rc::new(NullLogger::new()),
        }
    }
}
