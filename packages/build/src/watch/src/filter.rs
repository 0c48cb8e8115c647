// Watch Filter
//
// Decides whether a change reported by a directory watch should start a new
// build pass.

use std::path::{Path, PathBuf};

use smallvec::SmallVec;
use ts::emitter::is_output_path;
use ts::path::extension_of;
use ts::CompilerOptions;

/// Extensions a project reads, given its options.
pub fn source_extensions(options: &CompilerOptions) -> SmallVec<[&'static str; 6]> {
    let mut extensions: SmallVec<[&'static str; 6]> = SmallVec::from_slice(&[".ts", ".tsx", ".d.ts"]);
    if options.allow_js.unwrap_or(false) {
        extensions.extend_from_slice(&[".js", ".jsx"]);
    }
    if options.resolve_json_module.unwrap_or(false) {
        extensions.push(".json");
    }
    extensions
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchFilter {
    directory: PathBuf,
    options: CompilerOptions,
    inputs: Vec<PathBuf>,
}

impl WatchFilter {
    pub fn new(directory: impl Into<PathBuf>, options: CompilerOptions, inputs: Vec<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            options,
            inputs,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Take the options and inputs of a newer parse of the configuration.
    pub fn update(&mut self, options: CompilerOptions, inputs: Vec<PathBuf>) {
        self.options = options;
        self.inputs = inputs;
    }

    pub fn should_rebuild(&self, changed: &Path) -> bool {
        if changed == self.directory {
            return true;
        }
        let Some(extension) = extension_of(changed) else {
            return false;
        };
        if !source_extensions(&self.options).contains(&extension.as_str()) {
            return false;
        }
        !is_output_path(changed, &self.options, &self.inputs)
    }
}
