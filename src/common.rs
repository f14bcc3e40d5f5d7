//! Common text transformation functions.

use std::borrow::Cow;

/// Replaces substrings of `input` like
/// [`strtr`](https://www.php.net/strtr), trying longer needles first.
pub fn strtr<'a>(input: &'a str, replacements: &[(&str, &str)]) -> Cow<'a, str> {
    let replacements = if replacements.is_sorted_by(|(a, _), (b, _)| a.len() >= b.len()) {
        Cow::Borrowed(replacements)
    } else {
        let mut replacements = Vec::from(replacements);
        replacements.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        Cow::Owned(replacements)
    };

    let mut iter = input.char_indices();
    let mut out = String::new();
    let mut flushed = 0;
    'next: while iter.offset() != input.len() {
        for (find, replace) in replacements.iter() {
            if iter.as_str().starts_with(find) {
                out += &input[flushed..iter.offset()];
                out += *replace;
                flushed = iter.offset() + find.len();
                for _ in 0..find.len() {
                    iter.next();
                }
                continue 'next;
            }
        }
        iter.next();
    }

    if flushed == 0 {
        Cow::Borrowed(input)
    } else {
        out += &input[flushed..];
        Cow::Owned(out)
    }
}

/// Upper-cases the first character of `text`.
pub fn ucfirst(text: &str) -> Cow<'_, str> {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.to_uppercase().ne(core::iter::once(first)) => {
            Cow::Owned(first.to_uppercase().chain(chars).collect())
        }
        _ => Cow::Borrowed(text),
    }
}

/// Lower-cases the first character of `text`.
pub fn lcfirst(text: &str) -> Cow<'_, str> {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.to_lowercase().ne(core::iter::once(first)) => {
            Cow::Owned(first.to_lowercase().chain(chars).collect())
        }
        _ => Cow::Borrowed(text),
    }
}

/// Escapes all wikitext and HTML control characters.
pub fn escape_no_wiki(text: &str) -> Cow<'_, str> {
    strtr(
        text,
        &[
            ("\'\'", "&#39;&#39;"),
            ("__", "&#95;_"),
            ("-{", "-&#123;"),
            ("}-", "&#125;-"),
            ("!", "&#33;"),
            ("&", "&amp;"),
            (":", "&#58;"),
            (";", "&#59;"),
            ("<", "&lt;"),
            ("=", "&#61;"),
            (">", "&gt;"),
            ("[", "&#91;"),
            ("]", "&#93;"),
            ("{", "&#123;"),
            ("|", "&#124;"),
            ("}", "&#125;"),
        ],
    )
}

/// Escapes the characters which delimit templates, arguments, and links so
/// that a construct can be emitted as inert literal text.
pub fn escape_construct(text: &str) -> Cow<'_, str> {
    strtr(
        text,
        &[
            ("[", "&#91;"),
            ("]", "&#93;"),
            ("{", "&#123;"),
            ("|", "&#124;"),
            ("}", "&#125;"),
        ],
    )
}

/// Encodes section heading text into a format suitable for use as a URL anchor.
pub fn anchor_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for c in s.trim().chars() {
        if c.is_whitespace() || c == '_' {
            if !last_space {
                out.push('_');
            }
            last_space = true;
        } else {
            last_space = false;
            match c {
                '"' | '&' | '\'' | '<' | '>' => {
                    out += &format!(".{:02X}", u32::from(c));
                }
                c => out.push(c),
            }
        }
    }
    out
}

/// Removes anything that looks like an HTML tag from `text`.
pub fn strip_tags(text: &str) -> Cow<'_, str> {
    if !text.contains('<') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = memchr::memchr(b'<', rest.as_bytes()) {
        out += &rest[..start];
        if let Some(end) = memchr::memchr(b'>', &rest.as_bytes()[start..]) {
            rest = &rest[start + end + 1..];
        } else {
            out += &rest[start..];
            rest = "";
        }
    }
    out += rest;
    Cow::Owned(out)
}
