//! Tokenization: a raw command line into per-stage token lists.
//!
//! A word is a run of pieces glued together without intervening
//! whitespace: bare characters, single-quoted text (fully literal),
//! double-quoted text (backslash escapes `\` and `"` only), and
//! backslash-escaped characters. Unquoted `|` separates pipeline stages.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{anychar, char},
    combinator::{map, opt},
    multi::many1,
    sequence::preceded,
    IResult,
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LexError {
    #[error("empty input")]
    EmptyInput,
}

/// Characters that end a bare piece: token separators, the stage
/// separator, and the characters that start a quoted or escaped piece.
const WORD_BREAK: &[char] = &[' ', '\t', '\r', '\n', '|', '\'', '"', '\\'];

const SEPARATORS: &[char] = &[' ', '\t', '\r', '\n'];

fn bare(input: &str) -> IResult<&str, String> {
    map(take_while1(|c: char| !WORD_BREAK.contains(&c)), str::to_string)(input)
}

/// `'...'`: everything up to the closing quote is literal. A quote left
/// open at end of line closes there.
fn single_quoted(input: &str) -> IResult<&str, String> {
    let (rest, _) = char('\'')(input)?;
    match rest.find('\'') {
        Some(end) => Ok((&rest[end + 1..], rest[..end].to_string())),
        None => Ok(("", rest.to_string())),
    }
}

/// `"..."`: backslash escapes only `\` and `"`; before any other
/// character the backslash is kept literally. A quote left open at end
/// of line closes there.
fn double_quoted(input: &str) -> IResult<&str, String> {
    let (rest, _) = char('"')(input)?;
    let mut out = String::new();
    let mut pending_escape = false;
    for (i, ch) in rest.char_indices() {
        if pending_escape {
            if ch != '\\' && ch != '"' {
                out.push('\\');
            }
            out.push(ch);
            pending_escape = false;
        } else if ch == '\\' {
            pending_escape = true;
        } else if ch == '"' {
            return Ok((&rest[i + 1..], out));
        } else {
            out.push(ch);
        }
    }
    Ok(("", out))
}

/// `\x`: the next character taken literally. A trailing backslash at
/// end of input is consumed without producing anything.
fn escaped(input: &str) -> IResult<&str, String> {
    map(preceded(char('\\'), opt(anychar)), |ch| {
        ch.map(String::from).unwrap_or_default()
    })(input)
}

fn word(input: &str) -> IResult<&str, String> {
    map(
        many1(alt((single_quoted, double_quoted, escaped, bare))),
        |pieces| pieces.concat(),
    )(input)
}

/// Split a raw line into one token list per pipeline stage.
///
/// Returns [`LexError::EmptyInput`] when the line yields no tokens at
/// all. Stage lists may come back empty (`ls |`); the stage builder
/// rejects those.
pub fn lex(input: &str) -> Result<Vec<Vec<String>>, LexError> {
    let mut stages: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    let mut rest = input;
    loop {
        rest = rest.trim_start_matches(SEPARATORS);
        if rest.is_empty() {
            break;
        }
        if let Some(tail) = rest.strip_prefix('|') {
            stages.push(std::mem::take(&mut current));
            rest = tail;
            continue;
        }
        match word(rest) {
            Ok((tail, token)) => {
                // quoting can assemble the empty string (`''`); such
                // tokens are never emitted
                if !token.is_empty() {
                    current.push(token);
                }
                rest = tail;
            }
            Err(_) => break,
        }
    }
    stages.push(current);

    if stages.iter().all(Vec::is_empty) {
        return Err(LexError::EmptyInput);
    }
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Vec<String> {
        let mut stages = lex(input).unwrap();
        assert_eq!(stages.len(), 1, "expected a single stage for {input:?}");
        stages.remove(0)
    }

    #[test]
    fn splits_on_whitespace_runs() {
        assert_eq!(single("echo  a \tb"), ["echo", "a", "b"]);
    }

    #[test]
    fn empty_input_is_signalled() {
        assert_eq!(lex(""), Err(LexError::EmptyInput));
        assert_eq!(lex("   \t  "), Err(LexError::EmptyInput));
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(single(r"echo 'a  b' 'c\d'"), ["echo", "a  b", r"c\d"]);
    }

    #[test]
    fn double_quotes_escape_backslash_and_quote_only() {
        assert_eq!(
            single(r#"echo "c\"d" "a\\b" "x\yz""#),
            ["echo", r#"c"d"#, r"a\b", r"x\yz"]
        );
    }

    #[test]
    fn backslash_outside_quotes_escapes_anything() {
        assert_eq!(single(r"echo e\ f \'g"), ["echo", "e f", "'g"]);
    }

    #[test]
    fn adjacent_pieces_glue_into_one_token() {
        assert_eq!(single(r#"ec'ho' "wor"ld"#), ["echo", "world"]);
    }

    #[test]
    fn quoting_scenario_end_to_end() {
        assert_eq!(
            single(r#"echo 'a  b'  "c\"d"  e\ f"#),
            ["echo", "a  b", r#"c"d"#, "e f"]
        );
    }

    #[test]
    fn pipe_splits_stages() {
        assert_eq!(
            lex("ls -1 /bin | head -n 1 | wc").unwrap(),
            vec![
                vec!["ls".to_string(), "-1".into(), "/bin".into()],
                vec!["head".to_string(), "-n".into(), "1".into()],
                vec!["wc".to_string()],
            ]
        );
    }

    #[test]
    fn pipe_without_spaces_still_splits() {
        assert_eq!(
            lex("a|b").unwrap(),
            vec![vec!["a".to_string()], vec!["b".to_string()]]
        );
    }

    #[test]
    fn quoted_pipe_is_a_literal() {
        assert_eq!(
            single("echo 'a|b' \"c|d\" e\\|f"),
            ["echo", "a|b", "c|d", "e|f"]
        );
    }

    #[test]
    fn trailing_pipe_leaves_an_empty_stage() {
        assert_eq!(
            lex("ls |").unwrap(),
            vec![vec!["ls".to_string()], Vec::<String>::new()]
        );
    }

    #[test]
    fn trailing_backslash_is_consumed() {
        assert_eq!(single("echo a\\"), ["echo", "a"]);
        assert_eq!(lex("\\"), Err(LexError::EmptyInput));
    }

    #[test]
    fn unterminated_quotes_close_at_end_of_line() {
        assert_eq!(single("echo 'abc"), ["echo", "abc"]);
        assert_eq!(single("echo \"abc"), ["echo", "abc"]);
    }

    #[test]
    fn empty_quotes_emit_no_token() {
        assert_eq!(single("echo '' x"), ["echo", "x"]);
    }

    #[test]
    fn lexer_round_trip_on_plain_args() {
        let args = single("cat file1 file2 -n");
        assert_eq!(single(&args.join(" ")), args);
    }
}
