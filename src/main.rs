//! minnow - a small interactive POSIX-style shell
//!
//! Usage:
//!   minnow              Start the interactive shell
//!   minnow -c "cmd"     Execute a single command line
//!   minnow script.sh    Execute a script file line by line
//!   minnow --help       Show usage
//!   minnow --version    Show version

use std::env;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use minnow::history::History;
use minnow::repl::{self, LineOutcome};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"minnow {} - a small interactive POSIX-style shell

USAGE:
    minnow                  Start the interactive shell
    minnow -c <command>     Execute a single command line
    minnow <script>         Execute a script file line by line
    minnow --help           Show this help message
    minnow --version        Show version

FEATURES:
    cmd arg 'a b' "c\"d"    Quoting: single literal, double with \\ and \"
    cmd | cmd | cmd         Pipelines over OS pipes
    cmd > f  2>> f          Redirections: > >> 1> 1>> 2> 2>>
    echo exit cd pwd        Builtins (plus type and history)
    Tab / Up / Down         Completion and history navigation

ENVIRONMENT:
    PATH        Directories searched for external commands
    HOME        Expansion of a leading ~ in cd
    HISTFILE    History persisted across sessions when set
"#,
        VERSION
    );
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None => ExitCode::from(repl::run() as u8),
        Some("-c") => {
            let Some(command) = args.get(1) else {
                eprintln!("minnow: -c: option requires an argument");
                return ExitCode::from(2);
            };
            let history = Arc::new(History::default());
            repl::run_line(command, &history);
            ExitCode::SUCCESS
        }
        Some("--help" | "-h") => {
            print_help();
            ExitCode::SUCCESS
        }
        Some("--version" | "-V") => {
            println!("minnow {VERSION}");
            ExitCode::SUCCESS
        }
        Some(other) if other.starts_with('-') => {
            eprintln!("minnow: unrecognized option: {other}");
            print_help();
            ExitCode::from(2)
        }
        Some(script) => run_script(script),
    }
}

/// Execute a script file one line at a time; `#` lines are comments and
/// `exit` stops the script.
fn run_script(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("minnow: {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let history = Arc::new(History::default());
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let LineOutcome::Exit = repl::run_line(line, &history) {
            break;
        }
    }
    ExitCode::SUCCESS
}
