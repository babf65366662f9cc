//! Tab completion: builtins, executables on the search path, and
//! directory entries for argument positions.
//!
//! The engine is line-editor agnostic: it takes the buffer and cursor
//! and answers with what the editor should do (insert text, ring the
//! bell, or print the match list on the second tab). The rustyline
//! adapter lives in `repl`.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::MAIN_SEPARATOR;
use std::sync::Mutex;

use crate::builtins;
use crate::path;

/// What the line editor should do with the current tab press.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// No candidates (or nothing further to add): ring the terminal bell.
    Bell,
    /// Replace the buffer region `[start..cursor)` with `text`.
    Insert { start: usize, text: String },
    /// Second tab on an unchanged prefix: print the annotated match list
    /// and redraw the prompt; the buffer is untouched.
    Matches(Vec<String>),
}

#[derive(Debug, Clone)]
struct Match {
    name: String,
    is_dir: bool,
}

impl Match {
    fn display(&self) -> String {
        if self.is_dir {
            format!("{}{}", self.name, MAIN_SEPARATOR)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    last_prefix: String,
    /// 0 after a fresh prefix; 1 once the bell rang on an ambiguous one.
    tab: u8,
    matches: Vec<Match>,
    /// Executables found on the search path, scanned once per session.
    externals: Vec<String>,
    loaded_externals: bool,
}

/// The completion engine consulted by the line source on tab.
#[derive(Debug, Default)]
pub struct Completer {
    state: Mutex<State>,
}

impl Completer {
    pub fn new() -> Self {
        Completer::default()
    }

    /// Handle one tab press against `line` with the cursor at byte `pos`.
    pub fn complete(&self, line: &str, pos: usize) -> Completion {
        let before_cursor = &line[..pos];

        // completion scopes to the stage being typed: text after the
        // last pipe, then the last space-separated part
        let scope = before_cursor
            .rsplit('|')
            .next()
            .unwrap_or(before_cursor);
        let parts: Vec<&str> = scope.split(' ').collect();
        let (mut prefix, command_position) = match parts.len() {
            0 => (before_cursor, true),
            1 => (parts[0], true),
            n => (parts[n - 1], false),
        };

        // a path-qualified prefix searches inside the named directory
        let mut search_dir = None;
        if let Some(sep) = prefix.rfind(MAIN_SEPARATOR) {
            search_dir = Some(prefix[..sep].to_string());
            prefix = &prefix[sep + MAIN_SEPARATOR.len_utf8()..];
        }
        let start = pos - prefix.len();

        let mut state = self.state.lock().unwrap();

        if prefix.is_empty() && command_position {
            return Completion::Bell;
        }

        if state.last_prefix == prefix && state.tab == 1 {
            return Completion::Matches(state.matches.iter().map(Match::display).collect());
        }

        state.tab = 0;
        state.last_prefix = prefix.to_string();
        state.matches.clear();

        if command_position {
            if !state.loaded_externals {
                state.externals = scan_externals();
                state.loaded_externals = true;
            }
            state.collect_command_matches(prefix);
        } else {
            state.collect_dir_matches(prefix, search_dir.as_deref());
        }

        if state.matches.is_empty() {
            return Completion::Bell;
        }

        if state.matches.len() == 1 {
            let only = &state.matches[0];
            let mut text = only.name.clone();
            text.push(if only.is_dir { MAIN_SEPARATOR } else { ' ' });
            return Completion::Insert { start, text };
        }

        state.matches.sort_by(|a, b| a.name.cmp(&b.name));
        let common = longest_common_prefix(&state.matches);
        if common.chars().count() > prefix.chars().count() {
            return Completion::Insert {
                start,
                text: common,
            };
        }

        state.tab = 1;
        Completion::Bell
    }
}

impl State {
    /// Builtins first, then the cached externals, prefix-matched and
    /// deduplicated in that order.
    fn collect_command_matches(&mut self, prefix: &str) {
        let mut seen = HashSet::new();
        for name in builtins::BUILTINS
            .iter()
            .map(|b| b.to_string())
            .chain(self.externals.iter().cloned())
        {
            if name.starts_with(prefix) && seen.insert(name.clone()) {
                self.matches.push(Match {
                    name,
                    is_dir: false,
                });
            }
        }
    }

    /// Entries of the search directory (default: cwd), each annotated as
    /// directory-or-not.
    fn collect_dir_matches(&mut self, prefix: &str, search_dir: Option<&str>) {
        let Ok(cwd) = env::current_dir() else {
            return;
        };
        let dir = match search_dir {
            Some(sub) => cwd.join(sub),
            None => cwd,
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        let mut seen = HashSet::new();
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(prefix) && seen.insert(name.clone()) {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                self.matches.push(Match { name, is_dir });
            }
        }
        self.matches.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Scan every search-path directory for regular executable files,
/// deduplicated across directories in discovery order.
fn scan_externals() -> Vec<String> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for dir in path::search_dirs() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if path::is_executable(&entry.path(), &meta) && seen.insert(name.clone()) {
                found.push(name);
            }
        }
    }
    found
}

fn longest_common_prefix(matches: &[Match]) -> String {
    let Some(first) = matches.first() else {
        return String::new();
    };
    let mut common: Vec<char> = first.name.chars().collect();
    for m in &matches[1..] {
        let chars: Vec<char> = m.name.chars().collect();
        let mut keep = 0;
        while keep < common.len() && keep < chars.len() && common[keep] == chars[keep] {
            keep += 1;
        }
        common.truncate(keep);
        if common.is_empty() {
            break;
        }
    }
    common.into_iter().collect()
}
