//! Builds a document tree from preprocessor tokens.

use super::{
    ExtensionTag, FileMap, HeadingKind, HeadingLevel, Node, ParamKey, Params, Parser, Spanned,
    Template, TemplateArgument, Token,
    tag::{TagMatch, match_tag},
    tokenizer::tokenize,
};
use crate::{common::ucfirst, sanitizer::parse_attributes};
use log::debug;
use std::{
    cell::{Cell, OnceCell, RefCell},
    collections::HashSet,
};

/// Builds the document tree for `source`.
///
/// Heading indexes are taken from the shared `headings` counter. If
/// `heading_lines` is false, `=` heading syntax is not recognised. If
/// `at_line_start` is false, `source` continues a line of some larger text.
pub(super) fn build(
    source: &str,
    parser: &Parser,
    headings: &Cell<usize>,
    heading_lines: bool,
    at_line_start: bool,
) -> Vec<Node> {
    Builder {
        source,
        tokens: tokenize(source, heading_lines),
        parser,
        headings,
        at_line_start,
        unterminated: RefCell::default(),
        file_map: OnceCell::new(),
        nodes: Vec::new(),
    }
    .run()
}

/// A matched template or template argument expression.
#[derive(Debug)]
struct Construct {
    /// The position of the first opening delimiter character.
    start: usize,
    /// The number of braces in the opening delimiter.
    open: usize,
    /// The number of braces used by the closing delimiter.
    width: usize,
    /// The position after the last closing delimiter character.
    end: usize,
    /// The positions of pipes which separate parts of the expression.
    pipes: Vec<usize>,
    /// The position of the first separating `=` in each part.
    equals: Vec<Option<usize>>,
}

impl Construct {
    /// The byte ranges of each part of the expression, excluding delimiters.
    fn parts(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let starts =
            core::iter::once(self.start + self.open).chain(self.pipes.iter().map(|p| p + 1));
        let ends = self
            .pipes
            .iter()
            .copied()
            .chain(core::iter::once(self.end - self.width));
        starts.zip(ends)
    }
}

/// The document tree builder.
struct Builder<'a> {
    /// The source text.
    source: &'a str,
    /// The tokens of the source text.
    tokens: Vec<Spanned<Token>>,
    /// The parser configuration.
    parser: &'a Parser,
    /// The shared heading counter.
    headings: &'a Cell<usize>,
    /// Whether the source text starts a line.
    at_line_start: bool,
    /// Indexes of opening tokens already known to have no closing run.
    unterminated: RefCell<HashSet<usize>>,
    /// Line lookup for diagnostics, built on first use.
    file_map: OnceCell<FileMap<'a>>,
    /// The built nodes.
    nodes: Vec<Node>,
}

impl Builder<'_> {
    /// Consumes all tokens and returns the built nodes.
    fn run(mut self) -> Vec<Node> {
        let mut cursor = 0;
        let mut index = 0;
        while let Some(token) = self.tokens.get(index).copied() {
            index += 1;

            // Tokens which were consumed by a construct, or partially consumed
            // by one ending in the middle of a closing run
            if token.span.end <= cursor {
                continue;
            } else if token.span.start < cursor {
                self.push_text(cursor, token.span.end);
                cursor = token.span.end;
                continue;
            }

            cursor = match token.node {
                Token::TemplateOpen | Token::ArgOpen => {
                    if let Some(construct) = self.scan_construct(index - 1) {
                        self.push_construct(&construct);
                        construct.end
                    } else {
                        self.log_unterminated(token);
                        self.push_text(token.span.start, token.span.end);
                        token.span.end
                    }
                }
                Token::AngleOpen => self.tag(token.span.start).unwrap_or_else(|| {
                    self.push_text(token.span.start, token.span.end);
                    token.span.end
                }),
                Token::Equals {
                    line_start: true, ..
                } => self.heading(index - 1).unwrap_or_else(|| {
                    self.push_text(token.span.start, token.span.end);
                    token.span.end
                }),
                _ => {
                    self.push_text(token.span.start, token.span.end);
                    token.span.end
                }
            };
        }

        self.nodes
    }

    /// Appends `source[start..end]` to the trailing text node.
    fn push_text(&mut self, start: usize, end: usize) {
        push_text(&mut self.nodes, &self.source[start..end]);
    }

    /// Returns the index of the first token which starts at or after `pos`,
    /// searching from `index`.
    fn token_at(&self, mut index: usize, pos: usize) -> usize {
        while self.tokens.get(index).is_some_and(|token| token.span.start < pos) {
            index += 1;
        }
        index
    }

    /// Matches an extension tag starting at `pos`.
    fn extension_tag(&self, pos: usize) -> Option<TagMatch<'_>> {
        match_tag(self.source, pos, |name| self.parser.is_extension_tag(name))
    }

    /// Finds the end of the template or template argument expression which
    /// opens at token `index`.
    ///
    /// Every run of closing braces closes as many open expressions as it has
    /// braces for, innermost first. A `}}` closing a `{{{` closes it as if it
    /// were `{{`. Surplus closing braces are text.
    ///
    /// Pipes and `=` on a heading line are part of the heading, not
    /// separators.
    ///
    /// Whether an opener is closed depends only on the tokens after it, so
    /// every opener still open when a scan runs out of tokens is unterminated
    /// too, and is remembered as such. This keeps repeated scans over long
    /// unterminated input linear.
    fn scan_construct(&self, index: usize) -> Option<Construct> {
        if self.unterminated.borrow().contains(&index) {
            return None;
        }

        let open = self.tokens[index];
        let open_width = if open.node == Token::ArgOpen { 3 } else { 2 };
        let mut stack = vec![(open_width, index)];
        let mut links = 0_usize;
        let mut pipes = Vec::new();
        let mut equals = vec![None];
        let mut heading_end = 0;

        let mut index = index + 1;
        while let Some(token) = self.tokens.get(index) {
            let top_level = stack.len() == 1 && token.span.start >= heading_end;
            match token.node {
                Token::TemplateOpen => stack.push((2, index)),
                Token::ArgOpen => stack.push((3, index)),
                Token::TemplateClose | Token::ArgClose => {
                    let run_start = token.span.start;
                    let mut run_end = token.span.end;
                    index += 1;
                    while let Some(next) = self.tokens.get(index)
                        && matches!(next.node, Token::TemplateClose | Token::ArgClose)
                        && next.span.start == run_end
                    {
                        run_end = next.span.end;
                        index += 1;
                    }

                    let mut count = run_end - run_start;
                    while let Some(&(top, _)) = stack.last() {
                        let used = if count >= top {
                            top
                        } else if count == 2 {
                            2
                        } else {
                            break;
                        };
                        count -= used;
                        stack.pop();
                        if stack.is_empty() {
                            return Some(Construct {
                                start: open.span.start,
                                open: open_width,
                                width: used,
                                end: run_end - count,
                                pipes,
                                equals,
                            });
                        }
                    }
                    continue;
                }
                Token::LinkOpen if top_level => links += 1,
                Token::LinkClose if top_level => links = links.saturating_sub(1),
                Token::Pipe if top_level && links == 0 => {
                    pipes.push(token.span.start);
                    equals.push(None);
                }
                Token::Equals { line_start, .. } if top_level && links == 0 => {
                    if line_start && let Some(end) = self.heading_line_end(index) {
                        heading_end = end;
                    } else if let Some(slot) = equals.last_mut()
                        && slot.is_none()
                    {
                        *slot = Some(token.span.start);
                    }
                }
                Token::AngleOpen => {
                    if let Some(tag) = self.extension_tag(token.span.start) {
                        index = self.token_at(index, tag.end);
                        continue;
                    }
                }
                _ => {}
            }
            index += 1;
        }

        self.unterminated
            .borrow_mut()
            .extend(stack.into_iter().map(|(_, index)| index));
        None
    }

    /// If the `=` run at token `index` opens a heading line, returns the
    /// position after its closing run. Only the current line is considered.
    fn heading_line_end(&self, index: usize) -> Option<usize> {
        let open = self.tokens[index];
        let Token::Equals { len, line_end, .. } = open.node else {
            return None;
        };

        if line_end {
            return (len >= 3).then_some(open.span.end);
        }

        self.tokens[index + 1..]
            .iter()
            .take_while(|token| token.node != Token::Newline)
            .find(|token| matches!(token.node, Token::Equals { line_end: true, .. }))
            .map(|token| token.span.end)
    }

    /// Emits the node for a matched construct.
    fn push_construct(&mut self, construct: &Construct) {
        if construct.width == 3 {
            let mut parts = construct.parts();
            let name = parts.next().map_or("", |(start, end)| &self.source[start..end]);
            let default = construct
                .pipes
                .first()
                .map(|pipe| self.source[pipe + 1..construct.end - 3].to_string());
            self.nodes.push(Node::Argument(TemplateArgument {
                name: name.to_string(),
                default,
            }));
            return;
        }

        // A `{{{` closed by `}}` is a template with a leading literal brace
        let start = if construct.open == 3 {
            self.push_text(construct.start, construct.start + 1);
            construct.start + 1
        } else {
            construct.start
        };

        let mut parts = construct.parts();
        let name = parts
            .next()
            .map_or("", |(start, end)| self.source[start..end].trim());

        let mut params = Params::new();
        let mut position = 0;
        for ((start, end), equals) in parts.zip(construct.equals.iter().skip(1)) {
            if let Some(equals) = *equals {
                let name = self.source[start..equals].trim();
                let value = self.source[equals + 1..end].trim();
                if name.is_empty() {
                    continue;
                }
                params.insert(ParamKey::Named(name.to_string()), value.to_string());
            } else {
                position += 1;
                params.insert(
                    ParamKey::Positional(position),
                    self.source[start..end].to_string(),
                );
            }
        }

        let line_start = match start.checked_sub(1) {
            Some(before) => self.source.as_bytes()[before] == b'\n',
            None => self.at_line_start,
        };

        self.nodes.push(Node::Template(Template {
            name: ucfirst(name).into_owned(),
            params,
            source: self.source[start..construct.end].to_string(),
            line_start,
        }));
    }

    /// Matches an extension tag or HTML heading tag at `pos`. Returns the
    /// position after the tag.
    fn tag(&mut self, pos: usize) -> Option<usize> {
        let tag = match_tag(self.source, pos, |name| {
            heading_tag_level(name).is_some() || self.parser.is_extension_tag(name)
        })?;

        if let Some(level) = heading_tag_level(&tag.name)
            && !self.parser.is_extension_tag(&tag.name)
        {
            let content = tag.content?;
            let index = self.next_heading_index();
            let title = build(content, self.parser, self.headings, false, false);
            self.nodes.push(Node::Heading {
                title,
                level,
                kind: HeadingKind::HtmlTag(parse_attributes(tag.attributes)),
                index,
            });
        } else {
            self.nodes.push(Node::Extension(ExtensionTag {
                name: tag.name,
                attributes: parse_attributes(tag.attributes),
                self_closing: tag.content.is_none(),
                content: tag.content.unwrap_or_default().to_string(),
            }));
        }

        Some(tag.end)
    }

    /// Matches an `=` heading whose opening run is token `index`. Returns
    /// the position after the heading line, excluding the line terminator.
    fn heading(&mut self, index: usize) -> Option<usize> {
        let open = self.tokens[index];
        let Token::Equals {
            len: open_len,
            line_end: open_line_end,
            ..
        } = open.node
        else {
            return None;
        };

        let (level, title, end) = if open_line_end {
            // A line made only of `=`
            if open_len < 3 {
                return None;
            }
            let level = ((open_len - 1) / 2).min(6);
            (level, "=".repeat(open_len - level * 2), open.span.end)
        } else {
            let (close, close_len) = self.heading_close(index + 1)?;
            let level = open_len.min(close_len).min(6);
            let title = format!(
                "{}{}{}",
                "=".repeat(open_len - level),
                &self.source[open.span.end..close.span.start],
                "=".repeat(close_len - level)
            );
            (level, title, close.span.end)
        };

        let end = end
            + self.source.as_bytes()[end..]
                .iter()
                .take_while(|b| matches!(b, b' ' | b'\t'))
                .count();

        let index = self.next_heading_index();
        let title = build(&title, self.parser, self.headings, false, false);
        self.nodes.push(Node::Heading {
            title,
            level: HeadingLevel::clamped(level),
            kind: HeadingKind::EqualsSign,
            index,
        });

        Some(end)
    }

    /// Finds the closing `=` run of a heading, starting from token `index`.
    /// Templates and extension tags on the line are skipped whole, so may
    /// span multiple lines.
    fn heading_close(&self, mut index: usize) -> Option<(Spanned<Token>, usize)> {
        while let Some(token) = self.tokens.get(index) {
            match token.node {
                Token::Newline => return None,
                Token::Equals {
                    len,
                    line_end: true,
                    ..
                } => return Some((*token, len)),
                Token::TemplateOpen | Token::ArgOpen => {
                    if let Some(construct) = self.scan_construct(index) {
                        index = self.token_at(index, construct.end);
                        continue;
                    }
                }
                Token::AngleOpen => {
                    if let Some(tag) = self.extension_tag(token.span.start) {
                        index = self.token_at(index, tag.end);
                        continue;
                    }
                }
                _ => {}
            }
            index += 1;
        }
        None
    }

    /// Takes the next heading index from the shared counter.
    fn next_heading_index(&self) -> usize {
        let index = self.headings.get() + 1;
        self.headings.set(index);
        index
    }

    /// Logs the position of an unterminated expression.
    fn log_unterminated(&self, token: Spanned<Token>) {
        if log::log_enabled!(log::Level::Debug) {
            let kind = if token.node == Token::ArgOpen {
                "template argument"
            } else {
                "template"
            };
            let file_map = self.file_map.get_or_init(|| FileMap::new(self.source));
            debug!(
                "unterminated {kind} at {}",
                file_map.find_line_col(token.span.start)
            );
        }
    }
}

/// Appends `text` to the trailing text node of `nodes`, or adds a new text
/// node if there is none.
fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }

    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// Returns the heading level of an `h1`–`h6` tag name.
fn heading_tag_level(name: &str) -> Option<HeadingLevel> {
    match name.as_bytes() {
        [b'h', level @ b'1'..=b'6'] => HeadingLevel::try_from(level - b'0').ok(),
        _ => None,
    }
}
