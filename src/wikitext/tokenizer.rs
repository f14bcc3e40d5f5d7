//! Splits wikitext into a flat sequence of spanned delimiter and text tokens.

use super::{Spanned, Token};

/// Bytes which start a token other than [`Token::Text`].
const SPECIAL: [bool; 256] = {
    let mut table = [false; 256];
    table[b'{' as usize] = true;
    table[b'}' as usize] = true;
    table[b'[' as usize] = true;
    table[b']' as usize] = true;
    table[b'|' as usize] = true;
    table[b'<' as usize] = true;
    table[b'=' as usize] = true;
    table[b'\n' as usize] = true;
    table
};

/// Tokenises `source`.
///
/// If `headings` is false, runs of `=` are never marked as heading
/// delimiters.
pub(super) fn tokenize(source: &str, headings: bool) -> Vec<Spanned<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    // Every special byte is ASCII, so every token boundary is a char boundary
    while pos < bytes.len() {
        let byte = bytes[pos];
        if !SPECIAL[usize::from(byte)] {
            pos += 1;
            continue;
        }

        if text_start != pos {
            tokens.push(Spanned::new(Token::Text, text_start, pos));
        }

        let run = bytes[pos..].iter().take_while(|b| **b == byte).count();
        match byte {
            b'{' => fold_braces(&mut tokens, pos, run, true),
            b'}' => fold_braces(&mut tokens, pos, run, false),
            b'[' | b']' => fold_brackets(&mut tokens, pos, run, byte == b'['),
            b'=' => {
                let (line_start, line_end) = if headings {
                    let line_start = pos == 0 || bytes[pos - 1] == b'\n';
                    let line_end = bytes[pos + run..]
                        .iter()
                        .find(|b| !matches!(b, b' ' | b'\t'))
                        .is_none_or(|b| *b == b'\n');
                    (line_start, line_end)
                } else {
                    (false, false)
                };
                tokens.push(Spanned::new(
                    Token::Equals {
                        len: run,
                        line_start,
                        line_end,
                    },
                    pos,
                    pos + run,
                ));
            }
            _ => {
                let token = match byte {
                    b'|' => Token::Pipe,
                    b'<' => Token::AngleOpen,
                    _ => Token::Newline,
                };
                for offset in pos..pos + run {
                    tokens.push(Spanned::new(token, offset, offset + 1));
                }
            }
        }

        pos += run;
        text_start = pos;
    }

    if text_start != bytes.len() {
        tokens.push(Spanned::new(Token::Text, text_start, bytes.len()));
    }

    tokens
}

/// Folds a run of `len` braces starting at `start` into two- and
/// three-character delimiter tokens.
///
/// Two-character pieces are outermost, so they come first in an opening run
/// and last in a closing run. A single brace is text.
fn fold_braces(tokens: &mut Vec<Spanned<Token>>, start: usize, len: usize, open: bool) {
    if len == 1 {
        tokens.push(Spanned::new(Token::Text, start, start + 1));
        return;
    }

    let (twos, threes) = match len % 3 {
        0 => (0, len / 3),
        1 => (2, (len - 4) / 3),
        _ => (1, (len - 2) / 3),
    };

    let (two, three) = if open {
        (Token::TemplateOpen, Token::ArgOpen)
    } else {
        (Token::TemplateClose, Token::ArgClose)
    };

    let pieces = if open {
        core::iter::repeat_n((two, 2), twos)
            .chain(core::iter::repeat_n((three, 3), threes))
            .collect::<Vec<_>>()
    } else {
        core::iter::repeat_n((three, 3), threes)
            .chain(core::iter::repeat_n((two, 2), twos))
            .collect::<Vec<_>>()
    };

    let mut pos = start;
    for (token, width) in pieces {
        tokens.push(Spanned::new(token, pos, pos + width));
        pos += width;
    }
}

/// Folds a run of `len` square brackets starting at `start` into link
/// delimiter tokens. An odd bracket is text, on the outside of the run.
fn fold_brackets(tokens: &mut Vec<Spanned<Token>>, start: usize, len: usize, open: bool) {
    let token = if open {
        Token::LinkOpen
    } else {
        Token::LinkClose
    };
    let odd = len % 2 == 1;
    let mut pos = start;
    if odd && open {
        tokens.push(Spanned::new(Token::Text, pos, pos + 1));
        pos += 1;
    }
    for _ in 0..len / 2 {
        tokens.push(Spanned::new(token, pos, pos + 2));
        pos += 2;
    }
    if odd && !open {
        tokens.push(Spanned::new(Token::Text, pos, pos + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(Token, &str)> {
        tokenize(source, true)
            .into_iter()
            .map(|token| (token.node, &source[token.span.into_range()]))
            .collect()
    }

    #[test]
    fn plain() {
        assert_eq!(kinds("hello world"), [(Token::Text, "hello world")]);
        assert_eq!(kinds(""), []);
    }

    #[test]
    fn braces() {
        assert_eq!(
            kinds("{{{{{x}}}}}"),
            [
                (Token::TemplateOpen, "{{"),
                (Token::ArgOpen, "{{{"),
                (Token::Text, "x"),
                (Token::ArgClose, "}}}"),
                (Token::TemplateClose, "}}"),
            ]
        );
        assert_eq!(
            kinds("{{{{"),
            [(Token::TemplateOpen, "{{"), (Token::TemplateOpen, "{{")]
        );
        assert_eq!(
            kinds("{{{{{{{"),
            [
                (Token::TemplateOpen, "{{"),
                (Token::TemplateOpen, "{{"),
                (Token::ArgOpen, "{{{"),
            ]
        );
        assert_eq!(
            kinds("a{b}c"),
            [
                (Token::Text, "a"),
                (Token::Text, "{"),
                (Token::Text, "b"),
                (Token::Text, "}"),
                (Token::Text, "c"),
            ]
        );
    }

    #[test]
    fn brackets() {
        assert_eq!(
            kinds("[[[a]]]"),
            [
                (Token::Text, "["),
                (Token::LinkOpen, "[["),
                (Token::Text, "a"),
                (Token::LinkClose, "]]"),
                (Token::Text, "]"),
            ]
        );
    }

    #[test]
    fn equals() {
        let tokens = kinds("== a ==  \nb=c\n===");
        assert_eq!(
            tokens[0],
            (
                Token::Equals {
                    len: 2,
                    line_start: true,
                    line_end: false
                },
                "=="
            )
        );
        assert_eq!(
            tokens[2],
            (
                Token::Equals {
                    len: 2,
                    line_start: false,
                    line_end: true
                },
                "=="
            )
        );
        assert_eq!(
            tokens[6],
            (
                Token::Equals {
                    len: 1,
                    line_start: false,
                    line_end: false
                },
                "="
            )
        );
        assert_eq!(
            tokens.last(),
            Some(&(
                Token::Equals {
                    len: 3,
                    line_start: true,
                    line_end: true
                },
                "==="
            ))
        );

        assert!(tokenize("== a ==", false).iter().all(|token| !matches!(
            token.node,
            Token::Equals {
                line_start: true,
                ..
            } | Token::Equals { line_end: true, .. }
        )));
    }
}
