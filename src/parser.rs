//! Structural pass: per-stage token lists into a normalized pipeline.

use thiserror::Error;

use crate::command::{RedirectKind, Stage};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// A redirection operator with no target after it.
    #[error("syntax error near unexpected token `newline'")]
    DanglingRedirect,
    /// A pipe segment with no command in it.
    #[error("syntax error near unexpected token `|'")]
    EmptyStage,
}

/// Build the full pipeline from the lexer's token lists.
pub fn parse(token_lists: Vec<Vec<String>>) -> Result<Vec<Stage>, ParseError> {
    token_lists.into_iter().map(build_stage).collect()
}

/// Build one stage: the first token is the command; redirection
/// operators claim the following token as their target, everything else
/// is an argument. The last operator seen decides the effective
/// redirection; every named target is remembered in order.
pub fn build_stage(tokens: Vec<String>) -> Result<Stage, ParseError> {
    let mut tokens = tokens.into_iter();
    let Some(cmd) = tokens.next() else {
        return Err(ParseError::EmptyStage);
    };

    let mut stage = Stage {
        cmd,
        ..Stage::default()
    };

    let mut expect_target = false;
    for token in tokens {
        if expect_target {
            stage.redirect.targets.push(token);
            expect_target = false;
        } else if let Some(kind) = RedirectKind::from_token(&token) {
            stage.redirect.kind = Some(kind);
            expect_target = true;
        } else {
            stage.args.push(token);
        }
    }
    if expect_target {
        return Err(ParseError::DanglingRedirect);
    }

    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn plain_command_keeps_all_args() {
        let stage = build_stage(tokens(&["ls", "-l", "-a", "/tmp"])).unwrap();
        assert_eq!(stage.cmd, "ls");
        assert_eq!(stage.args, ["-l", "-a", "/tmp"]);
        assert_eq!(stage.redirect.kind, None);
        assert!(stage.redirect.targets.is_empty());
    }

    #[test]
    fn redirect_operator_claims_the_next_token() {
        let stage = build_stage(tokens(&["echo", "hi", ">", "out"])).unwrap();
        assert_eq!(stage.args, ["hi"]);
        assert_eq!(stage.redirect.kind, Some(RedirectKind::Stdout));
        assert_eq!(stage.redirect.targets, ["out"]);
    }

    #[test]
    fn all_targets_are_recorded_in_source_order() {
        let stage = build_stage(tokens(&["echo", "hi", ">", "a", ">", "b", ">", "c"])).unwrap();
        assert_eq!(stage.redirect.targets, ["a", "b", "c"]);
        assert_eq!(stage.redirect.kind, Some(RedirectKind::Stdout));
    }

    #[test]
    fn last_operator_wins_across_kinds() {
        let stage = build_stage(tokens(&["cmd", ">", "a", "2>>", "b"])).unwrap();
        assert_eq!(stage.redirect.kind, Some(RedirectKind::StderrAppend));
        assert_eq!(stage.redirect.targets, ["a", "b"]);
    }

    #[test]
    fn operator_target_pairs_never_become_args() {
        let stage = build_stage(tokens(&["cmd", "x", "2>", "err", "y"])).unwrap();
        assert_eq!(stage.args, ["x", "y"]);
        assert_eq!(stage.redirect.targets, ["err"]);
    }

    #[test]
    fn dangling_operator_is_rejected() {
        assert!(matches!(
            build_stage(tokens(&["echo", ">"])),
            Err(ParseError::DanglingRedirect)
        ));
    }

    #[test]
    fn empty_stage_is_rejected() {
        assert!(matches!(build_stage(Vec::new()), Err(ParseError::EmptyStage)));
        assert!(parse(vec![tokens(&["ls"]), Vec::new()]).is_err());
    }

    #[test]
    fn pipeline_builds_one_stage_per_list() {
        let stages = parse(vec![tokens(&["ls"]), tokens(&["wc", "-l"])]).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].cmd, "ls");
        assert_eq!(stages[1].cmd, "wc");
        assert_eq!(stages[1].args, ["-l"]);
    }
}
