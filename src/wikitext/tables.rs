//! Pipe-table markup to HTML conversion.
//!
//! This operates on lines of already-expanded text and emits HTML tables in
//! the same shape as MediaWiki, including its quirks: rows are opened lazily
//! by the first cell, a table with no rows gets an empty placeholder row, and
//! an unterminated table at the end of the text is closed implicitly.

use crate::sanitizer::{AttributeSanitizer, render_attributes};
use regex::Regex;
use std::sync::LazyLock;

/// A table start line.
static TABLE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(:*)\s*\{\|(.*)$").unwrap());

/// The characters trimmed from each line before matching.
const TRIM: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0b'];

/// The state of one open table.
#[derive(Debug, Default)]
struct TableState {
    /// The number of `<dl><dd>` wrappers opened around the table.
    indent: usize,
    /// A cell is open.
    td_open: bool,
    /// The tag name of the most recently opened cell.
    last_tag: &'static str,
    /// A row is open.
    tr_open: bool,
    /// The rendered attributes for the next row start tag.
    tr_attributes: String,
    /// A row was opened at some point in the table.
    has_opened_tr: bool,
}

impl TableState {
    /// Returns the end tags needed to close the open cell and row, if any.
    fn close_row(&mut self) -> String {
        let mut out = String::new();
        if core::mem::take(&mut self.td_open) {
            out += "</";
            out += self.last_tag;
            out.push('>');
        }
        if core::mem::take(&mut self.tr_open) {
            out += "</tr>";
        }
        out
    }
}

/// Converts pipe-table markup in `text` into HTML tables, sanitising
/// attributes with `sanitizer`. Text outside of tables is passed through
/// unchanged.
pub fn handle_tables(text: &str, sanitizer: &dyn AttributeSanitizer) -> String {
    let text = text.replace("\r\n", "\n");
    let mut out = String::with_capacity(text.len());
    let mut tables = Vec::<TableState>::new();

    for raw_line in text.split('\n') {
        let line = raw_line.trim_matches(TRIM);

        if line.is_empty() {
            out += raw_line;
            out.push('\n');
            continue;
        }

        let out_line = if let Some(caps) = TABLE_START.captures(line) {
            let indent = caps[1].len();
            let attributes = render_attributes(&sanitizer.fix_attributes(&caps[2], "table"));
            tables.push(TableState {
                indent,
                ..Default::default()
            });
            format!("{}<table{attributes}>", "<dl><dd>".repeat(indent))
        } else if let Some(table) = tables.last_mut() {
            if let Some(rest) = line.strip_prefix("|}") {
                let mut line = table.close_row();
                if !table.has_opened_tr {
                    line += "<tr><td></td></tr>";
                }
                line += "</table>";
                line += rest;
                let indent = table.indent;
                tables.pop();
                if indent > 0 {
                    let mut line = line.trim_end().to_string();
                    line += &"</dd></dl>".repeat(indent);
                    line
                } else {
                    line
                }
            } else if line.starts_with("|-") {
                let attributes = line.trim_start_matches('|').trim_start_matches('-');
                table.tr_attributes =
                    render_attributes(&sanitizer.fix_attributes(attributes, "tr"));
                table.has_opened_tr = true;
                table.close_row()
            } else if let Some((kind, cells)) = cell_line(line) {
                let mut out_line = String::new();
                for cell in split_cells(cells, kind == CellKind::Heading) {
                    out_line += &open_cell(table, kind, cell, sanitizer);
                }
                out_line
            } else {
                raw_line.to_string()
            }
        } else {
            raw_line.to_string()
        };

        out += &out_line;
        out.push('\n');
    }

    while let Some(mut table) = tables.pop() {
        if core::mem::take(&mut table.td_open) {
            out += "</td>\n";
        }
        if core::mem::take(&mut table.tr_open) {
            out += "</tr>\n";
        }
        if !table.has_opened_tr {
            out += "<tr><td></td></tr>\n";
        }
        out += "</table>\n";
    }

    if out.ends_with('\n') {
        out.pop();
    }

    if out == "<table>\n<tr><td></td></tr>\n</table>" {
        out.clear();
    }

    out
}

/// The kind of a table cell line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CellKind {
    /// `|+`
    Caption,
    /// `|`
    Data,
    /// `!`
    Heading,
}

impl CellKind {
    /// The HTML tag name for the cell.
    fn tag_name(self) -> &'static str {
        match self {
            CellKind::Caption => "caption",
            CellKind::Data => "td",
            CellKind::Heading => "th",
        }
    }
}

/// Classifies a trimmed line as a cell line and returns its kind and the text
/// after the cell marker.
fn cell_line(line: &str) -> Option<(CellKind, &str)> {
    if let Some(rest) = line.strip_prefix("|+") {
        Some((CellKind::Caption, rest))
    } else if let Some(rest) = line.strip_prefix('|') {
        Some((CellKind::Data, rest))
    } else {
        line.strip_prefix('!').map(|rest| (CellKind::Heading, rest))
    }
}

/// Emits one cell, closing the previous cell and opening a row if needed.
fn open_cell(
    table: &mut TableState,
    kind: CellKind,
    cell: &str,
    sanitizer: &dyn AttributeSanitizer,
) -> String {
    let mut previous = String::new();
    if kind != CellKind::Caption {
        let tr_attributes = core::mem::take(&mut table.tr_attributes);
        if !table.tr_open {
            previous = format!("<tr{tr_attributes}>\n");
        }
        table.tr_open = true;
        table.has_opened_tr = true;
    }

    if table.td_open {
        previous.insert_str(0, &format!("</{}>\n", table.last_tag));
    }

    let tag = kind.tag_name();
    table.last_tag = tag;
    table.td_open = true;

    match cell.split_once('|') {
        Some((attributes, content))
            if !attributes.contains("[[") && !attributes.contains("-{") =>
        {
            let attributes = render_attributes(&sanitizer.fix_attributes(attributes, tag));
            format!("{previous}<{tag}{attributes}>{}", content.trim_matches(TRIM))
        }
        _ => format!("{previous}<{tag}>{}", cell.trim_matches(TRIM)),
    }
}

/// Splits a cell line on `||` (and `!!` for heading lines), ignoring
/// separators inside links and HTML tags.
fn split_cells(line: &str, heading: bool) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut cells = Vec::new();
    let mut links = 0_usize;
    let mut in_tag = false;
    let mut cell_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        let rest = &bytes[pos..];
        match bytes[pos] {
            b'<' => in_tag = true,
            b'>' => in_tag = false,
            b'[' if rest.starts_with(b"[[") => {
                links += 1;
                pos += 2;
                continue;
            }
            b']' if rest.starts_with(b"]]") && links > 0 => {
                links -= 1;
                pos += 2;
                continue;
            }
            b'|' | b'!'
                if !in_tag
                    && links == 0
                    && (rest.starts_with(b"||") || (heading && rest.starts_with(b"!!"))) =>
            {
                cells.push(&line[cell_start..pos]);
                pos += 2;
                cell_start = pos;
                continue;
            }
            _ => {}
        }
        pos += 1;
    }

    cells.push(&line[cell_start..]);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::Sanitizer;

    fn tables(text: &str) -> String {
        handle_tables(text, &Sanitizer)
    }

    fn squash(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn simple() {
        assert_eq!(
            squash(&tables("{|\n|-\n|A\n|B\n|}")),
            "<table><tr><td>A</td><td>B</td></tr></table>"
        );
    }

    #[test]
    fn no_rows() {
        assert_eq!(
            squash(&tables("{|\n|}")),
            "<table><tr><td></td></tr></table>"
        );
    }

    #[test]
    fn unterminated_empty_table_collapses() {
        assert_eq!(tables("{|"), "");
    }

    #[test]
    fn unterminated_table_is_closed() {
        assert_eq!(
            tables("{|\n|a"),
            "<table>\n<tr>\n<td>a\n</td>\n</tr>\n</table>"
        );
    }

    #[test]
    fn passthrough() {
        assert_eq!(tables("a\n\nb"), "a\n\nb");
        assert_eq!(tables("a\r\nb\n"), "a\nb\n");
        assert_eq!(tables("|a\n!b"), "|a\n!b");
    }

    #[test]
    fn caption_only() {
        assert_eq!(
            tables("{|\n|+cap\n|}"),
            "<table>\n<caption>cap\n</caption><tr><td></td></tr></table>"
        );
    }

    #[test]
    fn inline_cells() {
        assert_eq!(
            squash(&tables("{|\n!h1!!h2\n|-\n|a||b\n|}")),
            "<table><tr><th>h1</th><th>h2</th></tr><tr><td>a</td><td>b</td></tr></table>"
        );
    }

    #[test]
    fn caption_and_attributes() {
        assert_eq!(
            tables("{| class=\"wikitable\" onclick=\"x\"\n|+ Cap\n|- style=\"color:red\"\n| align=\"left\" | a\n|}"),
            "<table class=\"wikitable\">\n<caption>Cap\n</caption>\n<tr style=\"color:red\">\n<td align=\"left\">a\n</td></tr></table>"
        );
    }

    #[test]
    fn links_are_not_split() {
        assert_eq!(
            squash(&tables("{|\n|[[a|b]]||[[c||d]]\n|}")),
            "<table><tr><td>[[a|b]]</td><td>[[c||d]]</td></tr></table>"
        );
    }

    #[test]
    fn indented_and_nested() {
        assert_eq!(
            tables(":{|\n|a\n{|\n|b\n|}\n|}"),
            "<dl><dd><table>\n<tr>\n<td>a\n<table>\n<tr>\n<td>b</td></tr></table>\n</td></tr></table></dd></dl>"
        );
    }

    #[test]
    fn text_inside_table() {
        assert_eq!(
            tables("{|\n|a\nmore\n|}"),
            "<table>\n<tr>\n<td>a\nmore\n</td></tr></table>"
        );
    }
}
