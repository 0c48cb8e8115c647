// Path Utilities
//
// Lexical path helpers. Nothing here touches the file system.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

static TS_DTS_JS_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\.d\.ts|\.tsx?|\.jsx?|\.json)$").unwrap());

/// Convert Windows-style separators to POSIX separators.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Remove a `.d.ts`, `.ts`, `.tsx`, `.js`, `.jsx` or `.json` extension.
pub fn strip_extension(path: &str) -> String {
    TS_DTS_JS_EXTENSION.replace(path, "").to_string()
}

/// The recognized extension of `path` including the dot, with `.d.ts` kept whole.
pub fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    TS_DTS_JS_EXTENSION
        .find(name)
        .map(|m| m.as_str().to_ascii_lowercase())
}

pub fn is_declaration_file(path: &Path) -> bool {
    extension_of(path).as_deref() == Some(".d.ts")
}

/// Swap the recognized extension of `path` for `extension`.
pub fn change_extension(path: &Path, extension: &str) -> PathBuf {
    let text = path.to_string_lossy();
    PathBuf::from(format!("{}{}", strip_extension(&text), extension))
}

/// Resolve `.` and `..` lexically.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join `path` onto `base` unless it is already absolute, then clean it.
pub fn resolve(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        clean_path(path)
    } else {
        clean_path(&base.join(path))
    }
}

/// `path` relative to `base`, POSIX separators; unrelated paths stay absolute.
pub fn relative_to(base: &Path, path: &Path) -> String {
    let base = clean_path(base);
    let path = clean_path(path);
    if !path.is_absolute() || !base.is_absolute() {
        return normalize_separators(&path.to_string_lossy());
    }

    let base_parts: Vec<_> = base.components().collect();
    let path_parts: Vec<_> = path.components().collect();
    let common = base_parts
        .iter()
        .zip(path_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common <= 1 && base_parts.len() > 1 {
        return normalize_separators(&path.to_string_lossy());
    }

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base_parts.len() {
        parts.push("..".to_string());
    }
    for part in &path_parts[common..] {
        parts.push(part.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

/// Longest directory that contains every path in `paths`.
pub fn common_source_directory(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut dirs = paths.iter().filter_map(|p| p.parent());
    let first = dirs.next()?;
    let mut common: Vec<Component> = first.components().collect();
    for dir in dirs {
        let len = common
            .iter()
            .zip(dir.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(len);
    }
    Some(common.iter().map(|c| c.as_os_str()).collect())
}

/// True when `path` equals `dir` or lies below it.
pub fn is_within(dir: &Path, path: &Path) -> bool {
    clean_path(path).starts_with(clean_path(dir))
}
