//! Types and functions for parsing and formatting MediaWiki title strings.

use crate::config::Configuration;
use html_escape::decode_html_entities;
use serde::Deserialize;
use std::borrow::Cow;

/// The title casing strategy for a namespace.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceCase {
    /// The first letter of the namespace name is capitalised.
    #[default]
    FirstLetter,
    /// The namespace name is case-sensitive.
    CaseSensitive,
}

/// An article namespace.
#[derive(Clone, Debug, Deserialize, Eq)]
pub struct Namespace {
    /// The namespace ID.
    pub id: i32,
    /// The display name of the namespace.
    pub name: String,
    /// The canonical name of the namespace.
    ///
    /// For example, the canonical 'Project' namespace, present on all MW
    /// installations, is normally given a display name matching the name of the
    /// wiki.
    #[serde(default)]
    pub canonical: Option<String>,
    /// The case folding strategy for titles in the namespace.
    #[serde(default)]
    pub case: NamespaceCase,
    /// Named aliases for the namespace.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Namespace {
    /// The special namespace ID used for direct links to media files.
    pub const MEDIA: i32 = -2;
    /// The special namespace ID used for dynamic pages.
    pub const SPECIAL: i32 = -1;
    /// The main namespace ID.
    pub const MAIN: i32 = 0;
    /// The talk namespace ID.
    pub const TALK: i32 = 1;
    /// The user namespace ID.
    pub const USER: i32 = 2;
    /// The user talk namespace ID.
    pub const USER_TALK: i32 = 3;
    /// The project namespace ID.
    pub const PROJECT: i32 = 4;
    /// The project talk namespace ID.
    pub const PROJECT_TALK: i32 = 5;
    /// The file namespace ID.
    pub const FILE: i32 = 6;
    /// The file talk namespace ID.
    pub const FILE_TALK: i32 = 7;
    /// The system namespace ID.
    pub const MEDIAWIKI: i32 = 8;
    /// The system talk namespace ID.
    pub const MEDIAWIKI_TALK: i32 = 9;
    /// The template namespace ID.
    pub const TEMPLATE: i32 = 10;
    /// The template talk namespace ID.
    pub const TEMPLATE_TALK: i32 = 11;
    /// The help namespace ID.
    pub const HELP: i32 = 12;
    /// The help talk namespace ID.
    pub const HELP_TALK: i32 = 13;
    /// The category namespace ID.
    pub const CATEGORY: i32 = 14;
    /// The category talk namespace ID.
    pub const CATEGORY_TALK: i32 = 15;
    /// The Scribunto module namespace ID.
    pub const MODULE: i32 = 828;
    /// The Scribunto module talk namespace ID.
    pub const MODULE_TALK: i32 = 829;
}

/// The reason a title string could not be made into a [`Title`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidTitle {
    /// The title was empty after normalisation.
    #[error("empty title")]
    Empty,
    /// The title contained a character which is not allowed in titles.
    #[error("illegal character {0:?} in title")]
    IllegalChar(char),
    /// The title was a relative path.
    #[error("relative path in title")]
    RelativePath,
    /// The title was longer than the storage limit.
    #[error("title too long ({0} bytes)")]
    TooLong(usize),
    /// The title consisted only of a namespace prefix.
    #[error("title has a namespace but no text")]
    NamespaceOnly,
}

/// The maximum length of a title, in bytes, excluding the namespace.
const MAX_TITLE_LEN: usize = 255;

/// A normalised article title.
#[derive(Clone, Debug, Eq)]
pub struct Title {
    /// The location of the fragment delimiter in the title, if one exists.
    ///
    /// ```text
    /// Namespace:Title/Sub/Page#Fragment
    ///                         ^
    /// ```
    fragment_delimiter: Option<usize>,

    /// The namespace ID of the title.
    namespace: i32,

    /// The location of the namespace delimiter in the title, if one exists.
    ///
    /// ```text
    /// Namespace:Title/Sub/Page#Fragment
    ///          ^
    /// ```
    ns_delimiter: Option<usize>,

    /// The full title text.
    text: String,
}

impl PartialEq for Title {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Title {
    /// Creates a title from a known namespace plus text parts.
    fn from_parts(namespace: &Namespace, title: &str, fragment: Option<&str>) -> Self {
        let mut text = String::with_capacity(namespace.name.len() + title.len() + 1);

        let ns_delimiter = (!namespace.name.is_empty()).then(|| {
            text.push_str(&namespace.name);
            text.push(':');
            namespace.name.len()
        });

        if namespace.case == NamespaceCase::FirstLetter
            && let Some(first) = title.chars().next()
            && first.is_lowercase()
        {
            text.extend(first.to_uppercase());
            text += &title[first.len_utf8()..];
        } else {
            text += title;
        }

        let fragment_delimiter = fragment.map(|fragment| {
            let fragment_delimiter = text.len();
            text.push('#');
            text += &normalize(fragment);
            fragment_delimiter
        });

        Self {
            fragment_delimiter,
            namespace: namespace.id,
            ns_delimiter,
            text,
        }
    }

    /// Creates a new [`Title`] from a title string and default namespace ID.
    ///
    /// A leading colon forces the main namespace. A prefix matching a
    /// namespace name or alias overrides the default namespace.
    ///
    /// In MediaWiki, this is like `newFromText`.
    pub fn new(text: &str, default_ns: i32, config: &Configuration) -> Result<Self, InvalidTitle> {
        let text = normalize(text);

        let (default_ns, text) = match text.strip_prefix(':') {
            Some(rest) => (Namespace::MAIN, rest.trim_start()),
            None => (default_ns, &*text),
        };

        let prefixed = text.split_once(':').and_then(|(lhs, rhs)| {
            config
                .namespace_by_name(lhs.trim_end())
                .map(|ns| (ns, rhs.trim_start()))
        });
        let has_prefix = prefixed.is_some();
        let (ns, text) = prefixed
            .or_else(|| config.namespace_by_id(default_ns).map(|ns| (ns, text)))
            .ok_or(InvalidTitle::Empty)?;

        let (text, fragment) = text
            .split_once('#')
            .map_or((text, None), |(text, frag)| (text.trim_end(), Some(frag)));

        validate(text, has_prefix)?;

        Ok(Self::from_parts(ns, text, fragment))
    }

    /// The page fragment.
    ///
    /// ```text
    /// Namespace:Title/Sub/Page#Fragment
    ///                          ^^^^^^^^
    /// ```
    pub fn fragment(&self) -> &str {
        let start_at = self.fragment_delimiter.map_or(self.text.len(), |d| d + 1);
        &self.text[start_at..]
    }

    /// The title without its fragment. Two titles with the same key refer to
    /// the same page.
    ///
    /// ```text
    /// Namespace:Title/Sub/Page#Fragment
    /// ^^^^^^^^^^^^^^^^^^^^^^^^
    /// ```
    pub fn key(&self) -> &str {
        let end_at = self.fragment_delimiter.unwrap_or(self.text.len());
        &self.text[..end_at]
    }

    /// The title’s namespace ID.
    pub fn namespace(&self) -> i32 {
        self.namespace
    }

    /// The path of the page.
    ///
    /// ```text
    /// Namespace:Title/Sub/Page#Fragment
    ///           ^^^^^^^^^^^^^^
    /// ```
    pub fn text(&self) -> &str {
        let start_at = self.ns_delimiter.map_or(0, |d| d + 1);
        let end_at = self.fragment_delimiter.unwrap_or(self.text.len());
        &self.text[start_at..end_at]
    }
}

impl core::fmt::Display for Title {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}

/// Checks the normalised text part of a title for validity.
fn validate(text: &str, has_prefix: bool) -> Result<(), InvalidTitle> {
    if text.is_empty() {
        return Err(if has_prefix {
            InvalidTitle::NamespaceOnly
        } else {
            InvalidTitle::Empty
        });
    }

    if let Some(c) = text
        .chars()
        .find(|c| matches!(c, '<' | '>' | '[' | ']' | '{' | '}' | '|') || c.is_control())
    {
        return Err(InvalidTitle::IllegalChar(c));
    }

    if text == "."
        || text == ".."
        || text.starts_with("./")
        || text.starts_with("../")
        || text.contains("/./")
        || text.contains("/../")
        || text.ends_with("/.")
        || text.ends_with("/..")
    {
        return Err(InvalidTitle::RelativePath);
    }

    if text.len() > MAX_TITLE_LEN {
        return Err(InvalidTitle::TooLong(text.len()));
    }

    Ok(())
}

/// Returns true if the given character `c` is a bidirectional text control
/// character.
fn bidi(c: char) -> bool {
    ('\u{200e}'..='\u{200f}').contains(&c) || ('\u{202a}'..='\u{202e}').contains(&c)
}

/// Normalises a title text part by decoding HTML entities and converting
/// runs of whitespace + underscore to a single space character.
pub fn normalize(text: &str) -> Cow<'_, str> {
    let decoded = decode_html_entities(text);
    let mut out = String::new();
    let mut flushed = 0;
    let mut iter = decoded.char_indices().peekable();

    while let Some((index, c)) = iter.next() {
        // Peek to avoid switching to owned-mode when encountering a single
        // space
        if trimmable(c) && (c != ' ' || matches!(iter.peek(), Some((_, c)) if trimmable(*c))) {
            while iter.next_if(|(_, c)| trimmable(*c)).is_some() {}

            // This acts like `trim`, not emitting a space at the start
            // (`index == 0`) or end (`peek().is_none()`) of the text.
            if let Some((next_index, _)) = iter.peek() {
                out += &decoded[flushed..index];
                flushed = *next_index;
                // Bidi markers get stripped because “Sometimes they slip
                // into cut-n-pasted page titles”
                if index != 0 && spacelike(c) {
                    out.push(' ');
                }
            }
        }
    }

    if flushed == 0 {
        match decoded {
            Cow::Borrowed(b) => Cow::Borrowed(b.trim_matches(trimmable)),
            Cow::Owned(o) => Cow::Owned(o.trim_matches(trimmable).to_string()),
        }
    } else {
        out += decoded[flushed..].trim_end_matches(trimmable);
        Cow::Owned(out)
    }
}

/// Returns true if the character `c` is considered like whitespace in title
/// text.
fn spacelike(c: char) -> bool {
    c == '_' || c.is_whitespace()
}

/// Returns true if the character `c` is trimmable in title text.
fn trimmable(c: char) -> bool {
    bidi(c) || spacelike(c)
}
