//! A data structure for tracking source positions in language implementations,
//! heavily adapted from [codemap](https://crates.io/crates/codemap).

/// A range of text within a string.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Span {
    /// The position in the codemap representing the first byte of the span.
    pub start: usize,

    /// The position after the last byte of the span.
    pub end: usize,
}

impl Span {
    #[inline]
    /// Converts the span into a range that can be used for string indexing.
    // This is not just using `From<core::ops::Range<usize>` because type
    // resolution fails in common use with `.into()` which eliminates any
    // benefit of using a standard conversion trait
    pub fn into_range(self) -> core::ops::Range<usize> {
        self.start..self.end
    }
}

/// Associate a Span with a value of arbitrary type (e.g. a token).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Spanned<T> {
    /// The value.
    pub node: T,
    /// The span.
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Creates a new [`Spanned`].
    #[inline]
    pub fn new(node: T, start: usize, end: usize) -> Self {
        Self {
            node,
            span: Span { start, end },
        }
    }
}

/// A one-based line and column position in a source text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineCol {
    /// The line number.
    pub line: usize,
    /// The column number, in characters.
    pub column: usize,
}

impl core::fmt::Display for LineCol {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A record of a source file’s lines.
#[derive(Clone)]
pub struct FileMap<'a> {
    /// The source file.
    source: &'a str,

    /// Byte positions of line beginnings.
    lines: Vec<usize>,
}

impl core::fmt::Debug for FileMap<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut limit = 100.min(self.source.len());
        while !self.source.is_char_boundary(limit) {
            limit += 1;
        }

        f.debug_struct("FileMap")
            .field(
                "source",
                &format!(
                    "{}{}",
                    &self.source[..limit],
                    if self.source.len() > limit { "…" } else { "" }
                ),
            )
            .finish()
    }
}

impl<'a> FileMap<'a> {
    /// Creates a new file map for the given source.
    pub fn new(source: &'a str) -> Self {
        let lines = core::iter::once(0)
            .chain(memchr::memchr_iter(b'\n', source.as_bytes()).map(|p| p + 1))
            .collect();

        Self { source, lines }
    }

    /// Gets the line and column of a byte position. Positions past the end of
    /// the source are clamped to the end.
    pub fn find_line_col(&self, pos: usize) -> LineCol {
        let mut pos = pos.min(self.source.len());
        while !self.source.is_char_boundary(pos) {
            pos -= 1;
        }
        let line = match self.lines.binary_search(&pos) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = self.source[self.lines[line]..pos].chars().count();
        LineCol {
            line: line + 1,
            column: column + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col() {
        let map = FileMap::new("ab\ncdé\n\nf");
        assert_eq!(map.find_line_col(0), LineCol { line: 1, column: 1 });
        assert_eq!(map.find_line_col(3), LineCol { line: 2, column: 1 });
        assert_eq!(map.find_line_col(7), LineCol { line: 2, column: 4 });
        assert_eq!(map.find_line_col(8), LineCol { line: 3, column: 1 });
        assert_eq!(map.find_line_col(9), LineCol { line: 4, column: 1 });
        assert_eq!(map.find_line_col(100).to_string(), "4:2");
    }
}
