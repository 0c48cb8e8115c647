/**
 * tsbuild
 *
 * Builds a project and its references, optionally watching for changes.
 */
use std::cell::RefCell;
use std::process;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use ts_build::{
    BuildEvent, BuildEventKind, BuildOptions, BuildSummary, BuilderOptions, CancellationToken,
    Diagnostic, LogLevel, Orchestrator,
};

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(error) => {
            eprintln!("error: {:#}", error);
            process::exit(1);
        }
    }
}

fn cli() -> Command {
    Command::new("tsbuild")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build a project and its references with custom transforms")
        .arg(
            Arg::new("project")
                .short('p')
                .long("project")
                .value_name("PATH")
                .default_value("tsconfig.json")
                .help("Path to tsconfig.json or to a directory containing one"),
        )
        .arg(
            Arg::new("watch")
                .short('w')
                .long("watch")
                .action(ArgAction::SetTrue)
                .help("Rebuild when inputs change"),
        )
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Build all projects, including those that appear up to date"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Report what the build is doing"),
        )
}

/// Returns whether the build finished without errors.
fn run() -> anyhow::Result<bool> {
    let matches = cli().get_matches();
    let project = matches
        .get_one::<String>("project")
        .map(String::as_str)
        .unwrap_or("tsconfig.json");
    let verbose = matches.get_flag("verbose");

    let mut options = BuilderOptions::default().with_build_options(BuildOptions {
        force: matches.get_flag("force"),
        verbose,
        ..Default::default()
    });
    if verbose {
        options = options.with_log_level(LogLevel::Info);
    }
    let orchestrator = Orchestrator::new(project, None, Some(options))?;

    let reported: Rc<RefCell<Vec<Diagnostic>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = reported.clone();
    orchestrator.on(BuildEventKind::Diagnostic, move |event| {
        if let BuildEvent::Diagnostic(diagnostic) = event {
            sink.borrow_mut().push(diagnostic.clone());
        }
        Ok(())
    });

    let token = CancellationToken::new();
    let interrupt = token.clone();
    ctrlc::set_handler(move || interrupt.cancel()).context("failed to install the Ctrl+C handler")?;

    if !matches.get_flag("watch") {
        let summary = orchestrator.build(None, None, Some(&token))?;
        flush(&orchestrator, &reported);
        return Ok(summary.succeeded());
    }

    orchestrator.on(BuildEventKind::BeforeSolution, |_| {
        println!("Starting compilation in watch mode...");
        Ok(())
    });
    let mut handle = orchestrator.watch(None, None, Some(&token))?;
    report_pass(&orchestrator, &reported, handle.last_summary());
    while !token.is_cancellation_requested() {
        if let Some(summary) = handle.poll(Duration::from_millis(250))? {
            report_pass(&orchestrator, &reported, &summary);
        }
    }
    handle.stop();
    Ok(true)
}

fn flush(orchestrator: &Orchestrator, reported: &RefCell<Vec<Diagnostic>>) {
    let diagnostics: Vec<Diagnostic> = reported.borrow_mut().drain(..).collect();
    if !diagnostics.is_empty() {
        eprint!("{}", orchestrator.format_diagnostics(&diagnostics));
    }
}

fn report_pass(orchestrator: &Orchestrator, reported: &RefCell<Vec<Diagnostic>>, summary: &BuildSummary) {
    flush(orchestrator, reported);
    if summary.cancelled {
        return;
    }
    match summary.errors {
        0 => println!("Found 0 errors. Watching for file changes."),
        1 => println!("Found 1 error. Watching for file changes."),
        n => println!("Found {} errors. Watching for file changes.", n),
    }
}
