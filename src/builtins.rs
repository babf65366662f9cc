//! The in-process command set.

use std::env;
use std::sync::Arc;

use crate::command::{RunError, Stage};
use crate::history::{History, HistoryError};
use crate::path;

/// Commands executed in-process, without spawning a child.
pub const BUILTINS: &[&str] = &["cd", "echo", "exit", "history", "pwd", "type"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Dispatch one builtin. Output goes through the stage's stdout binding
/// (a redirection file or pipe end when one is attached); errors bubble
/// up for the caller to route to the stage's stderr.
pub fn run(stage: &mut Stage, history: &Arc<History>) -> Result<(), RunError> {
    let output = match stage.cmd.as_str() {
        // termination is decided by the prompt loop; inside a pipeline
        // `exit` is a silent no-op
        "exit" => return Ok(()),
        "cd" => return change_dir(&stage.args),
        "pwd" => env::current_dir()?.display().to_string(),
        "echo" => stage.args.join(" "),
        "type" => type_of(&stage.args.join(" ")),
        "history" => match history_cmd(&stage.args, history)? {
            Some(listing) => listing,
            None => return Ok(()),
        },
        _ => return Ok(()),
    };

    if !output.is_empty() {
        stage.write_stdout(&format!("{output}\n"))?;
    }
    Ok(())
}

fn change_dir(args: &[String]) -> Result<(), RunError> {
    let arg = args.join(" ");
    let mut target = arg.clone();
    if let Some(rest) = target.strip_prefix('~') {
        let Some(home) = path::home_dir() else {
            return Err(RunError::NoSuchDirectory(arg));
        };
        target = format!("{}{}", home.display(), rest);
    }
    if env::set_current_dir(&target).is_err() {
        return Err(RunError::NoSuchDirectory(arg));
    }
    Ok(())
}

fn type_of(name: &str) -> String {
    if is_builtin(name) {
        format!("{name} is a shell builtin")
    } else if let Some(found) = path::lookup(name) {
        format!("{name} is {}", found.display())
    } else {
        format!("{name}: not found")
    }
}

/// `history [N | -r FILE | -w FILE | -a FILE]`. Returns the listing to
/// print, or `None` when the invocation only has side effects. The
/// "history empty" / "no new records" signals from the store are quiet
/// no-ops here.
fn history_cmd(args: &[String], history: &Arc<History>) -> Result<Option<String>, RunError> {
    let Some(first) = args.first() else {
        return Ok(render(history.entries()));
    };

    if let Ok(n) = first.parse::<i64>() {
        if n < 0 {
            return Err(RunError::HistoryOption(first.clone()));
        }
        return Ok(render(history.last_n(n as usize)));
    }

    match first.as_str() {
        "-r" | "-w" | "-a" => {
            let Some(file) = args.get(1) else {
                return Err(RunError::HistoryFile);
            };
            let result = match first.as_str() {
                "-r" => history.read_from_file(file),
                "-w" => history.write_to_file(file),
                _ => history.append_to_file(file),
            };
            match result {
                Ok(()) | Err(HistoryError::Empty) | Err(HistoryError::NoNewRecords) => Ok(None),
                Err(err) => Err(err.into()),
            }
        }
        other => Err(RunError::HistoryOption(other.to_string())),
    }
}

fn render(entries: Vec<(usize, String)>) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let lines: Vec<String> = entries
        .iter()
        .map(|(pos, line)| format!("    {pos}  {line}"))
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Stream;
    use std::fs;
    use std::io::Read;

    fn run_capturing(cmd: &str, args: &[&str], history: &Arc<History>) -> (Result<(), RunError>, String) {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out");
        let mut stage = Stage {
            cmd: cmd.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdout: Stream::Handle(fs::File::create(&out_path).unwrap()),
            ..Stage::default()
        };
        let result = run(&mut stage, history);
        drop(stage);
        let mut captured = String::new();
        fs::File::open(&out_path)
            .unwrap()
            .read_to_string(&mut captured)
            .unwrap();
        (result, captured)
    }

    #[test]
    fn echo_joins_args_with_single_spaces() {
        let history = Arc::new(History::default());
        let (result, out) = run_capturing("echo", &["a  b", "c"], &history);
        result.unwrap();
        assert_eq!(out, "a  b c\n");
    }

    #[test]
    fn echo_without_args_prints_nothing() {
        let history = Arc::new(History::default());
        let (result, out) = run_capturing("echo", &[], &history);
        result.unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn type_reports_builtins_and_misses() {
        let history = Arc::new(History::default());
        let (_, out) = run_capturing("type", &["echo"], &history);
        assert_eq!(out, "echo is a shell builtin\n");

        let (_, out) = run_capturing("type", &["definitely-not-a-command"], &history);
        assert_eq!(out, "definitely-not-a-command: not found\n");
    }

    #[test]
    fn exit_inside_a_stage_outputs_nothing() {
        let history = Arc::new(History::default());
        let (result, out) = run_capturing("exit", &[], &history);
        result.unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn history_lists_numbered_entries() {
        let history = Arc::new(History::default());
        for line in ["one", "two", "three", "four"] {
            history.push_back(line);
        }
        history.push_back("history 2");

        let (result, out) = run_capturing("history", &["2"], &history);
        result.unwrap();
        assert_eq!(out, "    4  four\n    5  history 2\n");
    }

    #[test]
    fn history_rejects_bad_options() {
        let history = Arc::new(History::default());
        history.push_back("one");

        let (result, _) = run_capturing("history", &["-5"], &history);
        assert!(matches!(result, Err(RunError::HistoryOption(_))));

        let (result, _) = run_capturing("history", &["-w"], &history);
        assert!(matches!(result, Err(RunError::HistoryFile)));

        let (result, _) = run_capturing("history", &["--frob"], &history);
        assert!(matches!(result, Err(RunError::HistoryOption(_))));
    }

    #[test]
    fn history_write_and_read_flags_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("saved");
        let history = Arc::new(History::default());
        history.push_back("alpha");
        history.push_back("beta");

        let (result, out) = run_capturing("history", &["-w", file.to_str().unwrap()], &history);
        result.unwrap();
        assert_eq!(out, "");
        assert_eq!(fs::read_to_string(&file).unwrap(), "alpha\nbeta\n");

        let other = Arc::new(History::default());
        other.push_back("gamma");
        let (result, _) = run_capturing("history", &["-r", file.to_str().unwrap()], &other);
        result.unwrap();
        assert_eq!(
            other.entries(),
            vec![(1, "gamma".into()), (2, "alpha".into()), (3, "beta".into())]
        );
    }

    #[test]
    fn cd_failure_names_the_argument() {
        let history = Arc::new(History::default());
        let (result, _) = run_capturing("cd", &["/definitely/not/here"], &history);
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "cd: /definitely/not/here: No such file or directory"
        );
    }
}
