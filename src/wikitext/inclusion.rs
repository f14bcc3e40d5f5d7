//! Comment removal and inclusion control (`<includeonly>`, `<noinclude>`,
//! `<onlyinclude>`).

use super::tag::match_tag;
use regex::Regex;
use std::sync::LazyLock;

/// An inclusion control start, end, or self-closing tag.
static INCLUSION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)<(/?)(includeonly|noinclude|onlyinclude)\s*(/?)>").unwrap()
});

/// An inclusion control tag mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InclusionMode {
    /// Display contents only when transcluded.
    IncludeOnly,
    /// Display contents only when not transcluded.
    NoInclude,
    /// Display contents only when transcluded, and treat all other content on
    /// the page as if it were wrapped by a `<noinclude>`.
    OnlyInclude,
}

/// A piece of the source text after comment removal.
#[derive(Debug, Eq, PartialEq)]
enum Piece<'a> {
    /// Plain text, including whole extension tags.
    Text(&'a str),
    /// An inclusion control start or end tag.
    Marker {
        /// The control tag mode.
        mode: InclusionMode,
        /// If true, this is an end tag.
        end: bool,
    },
}

/// Splits `source` into text and inclusion control markers, dropping comments
/// and self-closing inclusion control tags.
fn split<'a>(source: &'a str, is_extension_tag: &impl Fn(&str) -> bool) -> Vec<Piece<'a>> {
    let bytes = source.as_bytes();
    let mut pieces = Vec::new();
    let mut flushed = 0;
    let mut pos = 0;

    while let Some(offset) = memchr::memchr(b'<', &bytes[pos..]) {
        let start = pos + offset;
        let rest = &source[start..];

        let end = if rest.starts_with("<!--") {
            // An unterminated comment runs to the end of the input
            let end = memchr::memmem::find(&bytes[start + 4..], b"-->")
                .map_or(source.len(), |end| start + 4 + end + 3);
            if flushed != start {
                pieces.push(Piece::Text(&source[flushed..start]));
            }
            flushed = end;
            end
        } else if let Some(caps) = INCLUSION_TAG.captures(rest) {
            let end = start + caps[0].len();
            if flushed != start {
                pieces.push(Piece::Text(&source[flushed..start]));
            }
            if caps[3].is_empty() {
                let mode = match caps[2].to_ascii_lowercase().as_str() {
                    "includeonly" => InclusionMode::IncludeOnly,
                    "noinclude" => InclusionMode::NoInclude,
                    _ => InclusionMode::OnlyInclude,
                };
                pieces.push(Piece::Marker {
                    mode,
                    end: !caps[1].is_empty(),
                });
            }
            flushed = end;
            end
        } else if let Some(tag) = match_tag(source, start, is_extension_tag)
            && tag.content.is_some()
        {
            // Extension tag content is opaque, so is emitted verbatim
            tag.end
        } else {
            start + 1
        };

        pos = end;
    }

    if flushed != source.len() {
        pieces.push(Piece::Text(&source[flushed..]));
    }

    pieces
}

/// Removes comments from `source` and applies inclusion control tags
/// according to the `including` mode.
///
/// Unterminated inclusion control regions run to the end of the input.
pub(super) fn strip_inclusion(
    source: &str,
    including: bool,
    is_extension_tag: impl Fn(&str) -> bool,
) -> String {
    let pieces = split(source, &is_extension_tag);

    let has_onlyinclude = including
        && pieces.iter().any(|piece| {
            matches!(
                piece,
                Piece::Marker {
                    mode: InclusionMode::OnlyInclude,
                    end: false
                }
            )
        });

    if has_onlyinclude {
        log::trace!("<onlyinclude> found; everything else is excluded");
    }

    let mut out = String::with_capacity(source.len());
    let mut in_only = false;
    let mut skipping = false;
    for piece in pieces {
        match piece {
            Piece::Text(text) => {
                if !skipping && (!has_onlyinclude || in_only) {
                    out += text;
                }
            }
            Piece::Marker { mode, end } => match mode {
                InclusionMode::OnlyInclude => in_only = !end,
                InclusionMode::IncludeOnly if !including => skipping = !end,
                InclusionMode::NoInclude if including => skipping = !end,
                InclusionMode::IncludeOnly | InclusionMode::NoInclude => {}
            },
        }
    }

    out
}
