//! XML-like tag matching shared by the inclusion pre-pass and the tree
//! builder.

/// A matched tag.
#[derive(Debug, Eq, PartialEq)]
pub(super) struct TagMatch<'a> {
    /// The lowercased tag name.
    pub name: String,
    /// The raw attribute text.
    pub attributes: &'a str,
    /// The raw content, or `None` if the tag was self-closing.
    pub content: Option<&'a str>,
    /// The position after the end of the whole tag.
    pub end: usize,
}

/// Returns the byte length of the tag name starting at the beginning of
/// `bytes`.
fn name_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':'))
        .count()
}

/// Matches a start tag with a name accepted by `is_known` at `start`, plus its
/// content and end tag.
///
/// Returns `None` if the tag is unknown or unterminated.
pub(super) fn match_tag<'a>(
    source: &'a str,
    start: usize,
    is_known: impl Fn(&str) -> bool,
) -> Option<TagMatch<'a>> {
    let bytes = source.as_bytes();
    if bytes.get(start) != Some(&b'<') {
        return None;
    }

    let name_start = start + 1;
    let name_end = name_start + name_len(&bytes[name_start..]);
    if name_end == name_start {
        return None;
    }

    let name = source[name_start..name_end].to_ascii_lowercase();
    if !is_known(&name) {
        return None;
    }

    match bytes.get(name_end) {
        Some(b) if b.is_ascii_whitespace() || matches!(b, b'/' | b'>') => {}
        _ => return None,
    }

    let gt = name_end + memchr::memchr(b'>', &bytes[name_end..])?;
    if bytes[gt - 1] == b'/' {
        return Some(TagMatch {
            name,
            attributes: &source[name_end..gt - 1],
            content: None,
            end: gt + 1,
        });
    }

    let (close_start, close_end) = find_end_tag(source, gt + 1, &name)?;
    Some(TagMatch {
        name,
        attributes: &source[name_end..gt],
        content: Some(&source[gt + 1..close_start]),
        end: close_end,
    })
}

/// Finds the case-insensitive end tag `</name>` at or after `from`. Returns
/// its start and end positions.
pub(super) fn find_end_tag(source: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let bytes = source.as_bytes();
    memchr::memchr_iter(b'<', &bytes[from..])
        .map(|offset| from + offset)
        .find_map(|pos| {
            let name_start = pos + 2;
            let name_end = name_start + name.len();
            if bytes.get(pos + 1) != Some(&b'/')
                || !bytes
                    .get(name_start..name_end)
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name.as_bytes()))
            {
                return None;
            }

            let rest = &bytes[name_end..];
            let space = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
            (rest.get(space) == Some(&b'>')).then_some((pos, name_end + space + 1))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(name: &str) -> bool {
        matches!(name, "nowiki" | "ref")
    }

    #[test]
    fn paired() {
        let source = "a<NoWiki class=x>{{b}}</nowiki >c";
        let tag = match_tag(source, 1, known).unwrap();
        assert_eq!(tag.name, "nowiki");
        assert_eq!(tag.attributes, " class=x");
        assert_eq!(tag.content, Some("{{b}}"));
        assert_eq!(&source[tag.end..], "c");
    }

    #[test]
    fn self_closing() {
        let source = "<ref name=\"a\"/>x";
        let tag = match_tag(source, 0, known).unwrap();
        assert_eq!(tag.attributes, " name=\"a\"");
        assert_eq!(tag.content, None);
        assert_eq!(&source[tag.end..], "x");
    }

    #[test]
    fn rejected() {
        assert_eq!(match_tag("<span>a</span>", 0, known), None);
        assert_eq!(match_tag("<nowiki>a", 0, known), None);
        assert_eq!(match_tag("<nowikix>a</nowikix>", 0, known), None);
        assert_eq!(match_tag("<nowiki", 0, known), None);
        assert_eq!(match_tag("< nowiki>", 0, known), None);
    }
}
