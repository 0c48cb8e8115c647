// Configuration Parsing
//
// Reads a `tsconfig.json`: comments and trailing commas are tolerated,
// `extends` chains are merged, and include globs are expanded against the
// system's directory listing.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::diagnostics::{self, create_compiler_diagnostic};
use crate::path::{clean_path, extension_of, is_within, resolve};
use crate::program::CompilerOptions;
use crate::sys::System;
use crate::Diagnostic;

const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];
const MAX_EXTENDS_DEPTH: usize = 32;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WatchDirectoryFlags: u32 {
        const NONE = 0;
        const RECURSIVE = 1 << 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReference {
    /// Resolved path of the referenced configuration file.
    pub path: PathBuf,
    pub original_path: String,
    pub prepend: bool,
}

/// A fully resolved project configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCommandLine {
    pub config_file_path: PathBuf,
    pub options: CompilerOptions,
    pub file_names: Vec<PathBuf>,
    pub project_references: Vec<ProjectReference>,
    /// Directories whose contents decide the input set.
    pub wildcard_directories: IndexMap<PathBuf, WatchDirectoryFlags>,
    /// Non-fatal problems, such as an empty input set.
    pub errors: Vec<Diagnostic>,
}

impl ParsedCommandLine {
    pub fn config_dir(&self) -> &Path {
        self.config_file_path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

// ============================================================================
// Raw JSON
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFileJson {
    extends: Option<String>,
    compiler_options: Option<serde_json::Value>,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    references: Option<Vec<ReferenceJson>>,
}

#[derive(Debug, Deserialize)]
struct ReferenceJson {
    path: String,
    #[serde(default)]
    prepend: bool,
}

/// A configuration with every path made absolute, after `extends` merging.
#[derive(Debug, Default)]
struct ResolvedConfig {
    options: CompilerOptions,
    files: Option<Vec<PathBuf>>,
    include: Option<Vec<PathBuf>>,
    exclude: Option<Vec<PathBuf>>,
    references: Vec<ProjectReference>,
    errors: Vec<Diagnostic>,
}

/// Remove `//` and `/* */` comments outside of string literals.
pub fn strip_json_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            match ch {
                '\\' => out.extend(chars.next()),
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match (ch, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(ch);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        out.push('\n');
                    }
                    previous = c;
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Remove commas that directly precede `}` or `]`.
fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            out.push(ch);
            if ch == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
            out.push(ch);
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(ch);
            }
        } else {
            out.push(ch);
        }
        i += 1;
    }
    out
}

fn read_config_json(path: &Path, sys: &dyn System) -> Result<ConfigFileJson, Diagnostic> {
    let text = sys.read_file(path).ok_or_else(|| {
        create_compiler_diagnostic(diagnostics::CANNOT_READ_FILE, &[&path.to_string_lossy()])
    })?;
    let cleaned = strip_trailing_commas(&strip_json_comments(&text));
    if cleaned.trim().is_empty() {
        return Ok(ConfigFileJson::default());
    }
    serde_json::from_str(&cleaned).map_err(|err| {
        create_compiler_diagnostic(
            diagnostics::FAILED_TO_PARSE_FILE,
            &[&path.to_string_lossy(), &err.to_string()],
        )
        .with_file(path)
    })
}

/// Make the path-valued options absolute relative to `dir`.
fn resolve_option_paths(options: &mut CompilerOptions, dir: &Path) {
    for value in [
        &mut options.out_dir,
        &mut options.out_file,
        &mut options.declaration_dir,
        &mut options.root_dir,
    ] {
        if let Some(path) = value.as_mut() {
            *path = resolve(dir, path.as_str()).to_string_lossy().into_owned();
        }
    }
}

fn resolve_config(path: &Path, sys: &dyn System, chain: &mut Vec<PathBuf>) -> Result<ResolvedConfig, Diagnostic> {
    if chain.contains(&path.to_path_buf()) || chain.len() > MAX_EXTENDS_DEPTH {
        let cycle: Vec<String> = chain
            .iter()
            .chain(std::iter::once(&path.to_path_buf()))
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        return Err(create_compiler_diagnostic(
            diagnostics::CIRCULAR_EXTENDS,
            &[&cycle.join(" -> ")],
        ));
    }
    chain.push(path.to_path_buf());

    let json = read_config_json(path, sys)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("/"));

    let mut base = match &json.extends {
        Some(extends) => {
            let mut base_path = resolve(dir, extends);
            if extension_of(&base_path).as_deref() != Some(".json") {
                base_path = PathBuf::from(format!("{}.json", base_path.to_string_lossy()));
            }
            if !sys.file_exists(&base_path) {
                return Err(create_compiler_diagnostic(
                    diagnostics::FILE_NOT_FOUND,
                    &[&base_path.to_string_lossy()],
                ));
            }
            resolve_config(&base_path, sys, chain)?
        }
        None => ResolvedConfig::default(),
    };

    let mut options = match json.compiler_options {
        Some(value) => serde_json::from_value::<CompilerOptions>(value).unwrap_or_else(|err| {
            base.errors.push(
                create_compiler_diagnostic(
                    diagnostics::INVALID_COMPILER_OPTIONS,
                    &[&path.to_string_lossy(), &err.to_string()],
                )
                .with_file(path),
            );
            CompilerOptions::default()
        }),
        None => CompilerOptions::default(),
    };
    resolve_option_paths(&mut options, dir);

    let absolute = |specs: Vec<String>| -> Vec<PathBuf> { specs.iter().map(|s| resolve(dir, s)).collect() };
    let references = json
        .references
        .unwrap_or_default()
        .into_iter()
        .map(|reference| {
            let mut target = resolve(dir, &reference.path);
            if extension_of(&target).as_deref() != Some(".json") {
                target = target.join("tsconfig.json");
            }
            ProjectReference {
                path: target,
                original_path: reference.path,
                prepend: reference.prepend,
            }
        })
        .collect();

    chain.pop();
    Ok(ResolvedConfig {
        options: options.with_defaults(&base.options),
        files: json.files.map(absolute).or(base.files),
        include: json.include.map(absolute).or(base.include),
        exclude: json.exclude.map(absolute).or(base.exclude),
        references,
        errors: base.errors,
    })
}

// ============================================================================
// Input discovery
// ============================================================================

fn has_wildcard(segment: &str) -> bool {
    segment.contains(|c| matches!(c, '*' | '?' | '['))
}

/// Split an include spec into its literal base directory and whether the
/// wildcard part reaches into subdirectories.
fn wildcard_base(spec: &Path) -> (PathBuf, WatchDirectoryFlags) {
    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    for component in spec.components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !has_wildcard(&text) {
            base.push(component.as_os_str());
        } else {
            rest.push(text.into_owned());
        }
    }
    let recursive = rest.len() > 1 || rest.iter().any(|segment| segment.contains("**"));
    let flags = if recursive {
        WatchDirectoryFlags::RECURSIVE
    } else {
        WatchDirectoryFlags::NONE
    };
    (base, flags)
}

fn supported_extension(path: &Path, options: &CompilerOptions) -> bool {
    match extension_of(path).as_deref() {
        Some(".ts") | Some(".tsx") | Some(".d.ts") => true,
        Some(".js") | Some(".jsx") => options.allow_js.unwrap_or(false),
        _ => false,
    }
}

fn is_excluded(path: &Path, excludes: &[PathBuf]) -> bool {
    excludes.iter().any(|exclude| {
        let text = exclude.to_string_lossy();
        if has_wildcard(&text) {
            [text.to_string(), format!("{}/**/*", text)].iter().any(|pattern| {
                Pattern::new(pattern).map_or(false, |p| p.matches_path_with(path, GLOB_OPTIONS))
            })
        } else {
            is_within(exclude, path)
        }
    })
}

/// Parse the configuration at `config_path`.
///
/// `Err` means the file could not be read or is not valid JSON. Missing
/// inputs and invalid options are reported through `errors` instead.
/// `options_to_extend` sits underneath the project's own options.
pub fn parse_config_file(
    config_path: &Path,
    options_to_extend: Option<&CompilerOptions>,
    sys: &dyn System,
) -> Result<ParsedCommandLine, Diagnostic> {
    let config_path = resolve(&sys.get_current_directory(), config_path);
    let mut resolved = resolve_config(&config_path, sys, &mut Vec::new())?;
    if let Some(defaults) = options_to_extend {
        resolved.options = resolved.options.with_defaults(defaults);
    }
    let options = resolved.options;
    let dir = config_path.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();

    let mut file_names: Vec<PathBuf> = resolved.files.clone().unwrap_or_default();
    let include = match (&resolved.include, &resolved.files) {
        (Some(include), _) => include.clone(),
        (None, Some(_)) => Vec::new(),
        (None, None) => vec![dir.join("**/*")],
    };
    let exclude = resolved.exclude.clone().unwrap_or_else(|| {
        let mut defaults: Vec<PathBuf> = DEFAULT_EXCLUDES.iter().map(|d| dir.join(d)).collect();
        defaults.extend(options.out_dir.as_deref().map(PathBuf::from));
        defaults.extend(options.declaration_dir.as_deref().map(PathBuf::from));
        defaults
    });

    let mut wildcard_directories: IndexMap<PathBuf, WatchDirectoryFlags> = IndexMap::new();
    for spec in &include {
        let spec_text = spec.to_string_lossy();
        let (base, flags, pattern) = if has_wildcard(&spec_text) {
            let (base, flags) = wildcard_base(spec);
            (base, flags, spec_text.to_string())
        } else if sys.directory_exists(spec) {
            (spec.clone(), WatchDirectoryFlags::RECURSIVE, format!("{}/**/*", spec_text))
        } else {
            if sys.file_exists(spec) && !file_names.contains(spec) {
                file_names.push(spec.clone());
            }
            continue;
        };

        *wildcard_directories.entry(base.clone()).or_default() |= flags;

        let Ok(pattern) = Pattern::new(&pattern) else {
            continue;
        };
        let explicit_json = spec_text.ends_with(".json");
        for candidate in sys.read_directory(&base) {
            let candidate = clean_path(&candidate);
            let wanted = supported_extension(&candidate, &options)
                || (explicit_json && extension_of(&candidate).as_deref() == Some(".json"));
            if wanted
                && pattern.matches_path_with(&candidate, GLOB_OPTIONS)
                && !is_excluded(&candidate, &exclude)
                && !file_names.contains(&candidate)
            {
                file_names.push(candidate);
            }
        }
    }

    // A `.ts` input shadows a `.js` or `.d.ts` file of the same name.
    let shadowed: Vec<PathBuf> = file_names
        .iter()
        .filter(|file| matches!(extension_of(file).as_deref(), Some(".js") | Some(".jsx") | Some(".d.ts")))
        .filter(|file| {
            let stem = crate::path::strip_extension(&file.to_string_lossy());
            file_names.iter().any(|other| {
                other != *file
                    && matches!(extension_of(other).as_deref(), Some(".ts") | Some(".tsx"))
                    && crate::path::strip_extension(&other.to_string_lossy()) == stem
            })
        })
        .cloned()
        .collect();
    file_names.retain(|file| !shadowed.contains(file));

    // Drop directories already covered by a recursive ancestor.
    let covered: Vec<PathBuf> = wildcard_directories
        .keys()
        .filter(|dir| {
            wildcard_directories.iter().any(|(other, flags)| {
                other != *dir && flags.contains(WatchDirectoryFlags::RECURSIVE) && dir.starts_with(other)
            })
        })
        .cloned()
        .collect();
    for dir in covered {
        wildcard_directories.shift_remove(&dir);
    }

    let mut errors = resolved.errors;
    if file_names.is_empty() && resolved.references.is_empty() {
        let to_json = |specs: &[PathBuf]| {
            let relative: Vec<String> = specs
                .iter()
                .map(|s| crate::path::relative_to(&dir, s))
                .collect();
            serde_json::to_string(&relative).unwrap_or_default()
        };
        errors.push(
            create_compiler_diagnostic(
                diagnostics::NO_INPUTS_FOUND,
                &[&config_path.to_string_lossy(), &to_json(&include), &to_json(&exclude)],
            )
            .with_file(&config_path),
        );
    }

    Ok(ParsedCommandLine {
        config_file_path: config_path,
        options,
        file_names,
        project_references: resolved.references,
        wildcard_directories,
        errors,
    })
}
