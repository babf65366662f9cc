//! Interactive prompt loop wired to the line editor.
//!
//! rustyline owns the terminal (raw mode, cursor, redraw); this module
//! plugs the shell into it: the completion engine through a `Helper`,
//! the history walk through Up/Down key handlers, and the prompt loop
//! around `readline`.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use rustyline::completion::{Completer as LineCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Editor, Event, EventContext, EventHandler, Helper, KeyCode,
    KeyEvent, Modifiers, Movement, RepeatCount,
};

use crate::completer::{Completer, Completion};
use crate::history::History;
use crate::lexer;
use crate::parser;
use crate::pipeline;

const PROMPT: &str = "$ ";

/// What the prompt loop should do after one input line.
pub enum LineOutcome {
    Continue,
    Exit,
}

/// rustyline helper carrying the completion engine.
struct ShellHelper {
    completer: Arc<Completer>,
}

impl Helper for ShellHelper {}

impl LineCompleter for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        match self.completer.complete(line, pos) {
            Completion::Insert { start, text } => Ok((
                start,
                vec![Pair {
                    display: text.clone(),
                    replacement: text,
                }],
            )),
            Completion::Bell => {
                ring_bell();
                Ok((pos, Vec::new()))
            }
            Completion::Matches(matches) => {
                // second tab: print the list below the line and redraw
                // the prompt, leaving the buffer untouched
                let mut out = io::stdout().lock();
                let _ = write!(out, "\r\n{}\r\n{}{}", matches.join("  "), PROMPT, &line[..pos]);
                let _ = out.flush();
                Ok((pos, Vec::new()))
            }
        }
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

fn ring_bell() {
    let mut out = io::stdout().lock();
    let _ = out.write_all(b"\x07");
    let _ = out.flush();
}

/// Up/Down handler: replaces the whole line buffer with the neighbouring
/// history entry. Bound conditionally so an untouched key falls back to
/// doing nothing rather than rustyline's own history.
struct HistoryWalker {
    history: Arc<History>,
    up: bool,
}

impl ConditionalEventHandler for HistoryWalker {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        _ctx: &EventContext,
    ) -> Option<Cmd> {
        let replacement = if self.up {
            self.history.walk_up()
        } else {
            self.history.walk_down()
        };
        match replacement {
            Some(line) => Some(Cmd::Replace(Movement::WholeLine, Some(line))),
            None => Some(Cmd::Noop),
        }
    }
}

/// Parse and execute one input line. Shared between the interactive
/// loop and `-c` one-shot mode.
pub fn run_line(line: &str, history: &Arc<History>) -> LineOutcome {
    let token_lists = match lexer::lex(line) {
        Ok(lists) => lists,
        // nothing typed; not worth a diagnostic
        Err(lexer::LexError::EmptyInput) => return LineOutcome::Continue,
    };

    let stages = match parser::parse(token_lists) {
        Ok(stages) => stages,
        Err(err) => {
            eprintln!("{err}");
            return LineOutcome::Continue;
        }
    };

    // `exit` ends the shell only as the whole pipeline
    if stages.len() == 1 && stages[0].cmd == "exit" {
        return LineOutcome::Exit;
    }

    pipeline::execute(stages, history);
    LineOutcome::Continue
}

/// Run the interactive shell. Returns the process exit code.
pub fn run() -> i32 {
    let history = Arc::new(History::default());
    let completer = Arc::new(Completer::new());

    // keep the shell alive across ^C while a foreground child runs; the
    // child gets the signal and dies, the prompt comes back
    let _ = ctrlc::set_handler(|| {});

    let mut editor: Editor<ShellHelper, DefaultHistory> = match Editor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("failed to start line editor: {err}");
            return 1;
        }
    };
    editor.set_helper(Some(ShellHelper { completer }));
    editor.bind_sequence(
        KeyEvent(KeyCode::Up, Modifiers::NONE),
        EventHandler::Conditional(Box::new(HistoryWalker {
            history: Arc::clone(&history),
            up: true,
        })),
    );
    editor.bind_sequence(
        KeyEvent(KeyCode::Down, Modifiers::NONE),
        EventHandler::Conditional(Box::new(HistoryWalker {
            history: Arc::clone(&history),
            up: false,
        })),
    );

    let hist_file = env::var("HISTFILE").ok().filter(|path| !path.is_empty());
    if let Some(ref path) = hist_file {
        let _ = history.read_from_file(path);
        // what was just loaded is already on disk; only entries from
        // this session should be appended at shutdown
        history.mark_flushed();
    }

    let code = loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    history.push_back(trimmed);
                }
                match run_line(&line, &history) {
                    LineOutcome::Continue => {}
                    LineOutcome::Exit => break 0,
                }
            }
            // ^C cancels the line and comes back for the next one
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break 0,
            Err(err) => {
                eprintln!("failed to read input: {err}");
                break 1;
            }
        }
    };

    if let Some(ref path) = hist_file {
        let _ = history.append_to_file(path);
    }

    code
}
