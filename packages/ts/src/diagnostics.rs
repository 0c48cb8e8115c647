// Diagnostic Messages and Formatting
//
// Message templates use `{0}`-style placeholders. Formatting renders the
// `file(line,col): error TS1234: message` form relative to the current
// directory.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Diagnostic, DiagnosticCategory};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\d+)\}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: i32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

macro_rules! messages {
    ($($name:ident = ($code:expr, $category:ident, $message:expr);)*) => {
        $(
            pub const $name: DiagnosticMessage = DiagnosticMessage {
                code: $code,
                category: DiagnosticCategory::$category,
                message: $message,
            };
        )*
    };
}

messages! {
    UNTERMINATED_STRING_LITERAL = (1002, Error, "Unterminated string literal.");
    TOKEN_EXPECTED = (1005, Error, "'{0}' expected.");
    EXPRESSION_EXPECTED = (1109, Error, "Expression expected.");
    INVALID_CHARACTER = (1127, Error, "Invalid character.");
    DECLARATION_OR_STATEMENT_EXPECTED = (1128, Error, "Declaration or statement expected.");
    TYPE_NOT_ASSIGNABLE = (2322, Error, "Type '{0}' is not assignable to type '{1}'.");
    CANNOT_REDECLARE_BLOCK_SCOPED_VARIABLE = (2451, Error, "Cannot redeclare block-scoped variable '{0}'.");
    COULD_NOT_WRITE_FILE = (5033, Error, "Could not write file '{0}': {1}.");
    CANNOT_READ_FILE = (5083, Error, "Cannot read file '{0}'.");
    FILE_NOT_FOUND = (6053, Error, "File '{0}' not found.");
    BUILDING_PROJECT = (6358, Message, "Building project '{0}'...");
    PROJECT_UP_TO_DATE = (6361, Message, "Project '{0}' is up to date");
    PROJECT_REFERENCE_CYCLE = (6202, Error, "Project references may not form a circular graph. Cycle detected: {0}");
    SKIPPING_BUILD_REFERENCE_HAS_ERRORS = (6363, Message, "Skipping build of project '{0}' because its dependency '{1}' has errors");
    NO_INPUTS_FOUND = (18003, Error, "No inputs were found in config file '{0}'. Specified 'include' paths were '{1}' and 'exclude' paths were '{2}'.");
    FAILED_TO_PARSE_FILE = (5014, Error, "Failed to parse file '{0}': {1}.");
    INVALID_COMPILER_OPTIONS = (5024, Error, "Invalid 'compilerOptions' in '{0}': {1}.");
    CIRCULAR_EXTENDS = (18000, Error, "Circularity detected while resolving configuration: {0}");
}

/// Substitute `{n}` placeholders with `args[n]`; unknown indices are kept.
pub fn format_message(template: &str, args: &[&str]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .map(|arg| arg.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// A global (file-less) diagnostic.
pub fn create_compiler_diagnostic(message: DiagnosticMessage, args: &[&str]) -> Diagnostic {
    Diagnostic::new(
        message.category,
        message.code,
        format_message(message.message, args),
    )
}

/// A diagnostic anchored at `start..start + length` of `text`.
pub fn create_file_diagnostic(
    message: DiagnosticMessage,
    file: &Path,
    text: &str,
    start: usize,
    length: usize,
    args: &[&str],
) -> Diagnostic {
    create_compiler_diagnostic(message, args).with_span(file, text, start, length)
}

pub trait FormatDiagnosticsHost {
    fn get_current_directory(&self) -> String;
    fn get_new_line(&self) -> String;
    fn get_canonical_file_name(&self, file_name: &str) -> String {
        file_name.to_string()
    }
}

/// Render diagnostics one per line, paths relative to the host directory.
pub fn format_diagnostics(diagnostics: &[Diagnostic], host: &dyn FormatDiagnosticsHost) -> String {
    let new_line = host.get_new_line();
    let cwd = host.get_current_directory();
    let mut output = String::new();

    for diagnostic in diagnostics {
        if let Some(file) = &diagnostic.file {
            let relative = crate::path::relative_to(Path::new(&cwd), file);
            output.push_str(&host.get_canonical_file_name(&relative));
            if let Some(position) = diagnostic.position {
                output.push_str(&format!("({},{})", position.line + 1, position.character + 1));
            }
            output.push_str(": ");
        }
        output.push_str(&format!(
            "{} TS{}: {}",
            diagnostic.category.as_str(),
            diagnostic.code,
            diagnostic.message_text.flatten(&new_line)
        ));
        output.push_str(&new_line);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Host;

    impl FormatDiagnosticsHost for Host {
        fn get_current_directory(&self) -> String {
            "/work".to_string()
        }

        fn get_new_line(&self) -> String {
            "\n".to_string()
        }
    }

    #[test]
    fn should_substitute_placeholders() {
        assert_eq!(format_message("'{0}' expected.", &[";"]), "';' expected.");
        assert_eq!(format_message("{0} and {3}", &["a"]), "a and {3}");
    }

    #[test]
    fn should_format_with_relative_paths_and_positions() {
        let text = "const a = 1;\nconst a = 2;";
        let diagnostic = create_file_diagnostic(
            CANNOT_REDECLARE_BLOCK_SCOPED_VARIABLE,
            Path::new("/work/src/index.ts"),
            text,
            19,
            1,
            &["a"],
        );
        assert_eq!(
            format_diagnostics(&[diagnostic], &Host),
            "src/index.ts(2,7): error TS2451: Cannot redeclare block-scoped variable 'a'.\n"
        );
    }

    #[test]
    fn should_format_global_diagnostics_without_location() {
        let diagnostic = create_compiler_diagnostic(FILE_NOT_FOUND, &["/work/missing.ts"]);
        assert_eq!(
            format_diagnostics(&[diagnostic], &Host),
            "error TS6053: File '/work/missing.ts' not found.\n"
        );
    }
}
