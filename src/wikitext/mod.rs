//! Wikitext preprocessor.
//!
//! The preprocessor only understands the parts of Wikitext which affect
//! template expansion: templates, template arguments, extension tags, and
//! headings. Everything else is text.

pub use codemap::{FileMap, LineCol, Span, Spanned};
use indexmap::IndexMap;
use std::{cell::Cell, collections::HashSet};
pub use tables::handle_tables;

pub use crate::sanitizer::Attributes;

mod builder;
mod codemap;
mod inclusion;
mod tables;
mod tag;
#[cfg(test)]
mod tests;
mod tokenizer;

/// A Wikitext preprocessor.
#[derive(Clone, Debug, Default)]
pub struct Parser {
    /// Registered extension tag names, lowercased.
    extension_tags: HashSet<String>,
}

impl Parser {
    /// Creates a new parser which recognises the given extension tag names.
    /// Unregistered tags are plain text.
    pub fn new<I, S>(extension_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extension_tags: extension_tags
                .into_iter()
                .map(|name| name.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Returns true if `name` is a registered extension tag.
    pub fn is_extension_tag(&self, name: &str) -> bool {
        self.extension_tags.contains(&name.to_ascii_lowercase())
    }

    /// Applies inclusion control tags and strips comments from `text`, then
    /// parses the result into a document tree.
    ///
    /// In MediaWiki, this is `preprocessToObj`.
    pub fn preprocess_to_obj(&self, text: &str, for_inclusion: bool) -> Document {
        let text = inclusion::strip_inclusion(text, for_inclusion, |name| {
            self.is_extension_tag(name)
        });
        self.build(&text, true)
    }

    /// Parses `text` into a document tree without applying inclusion control
    /// tags. This is used for text which already passed through
    /// [`Self::preprocess_to_obj`] as part of a larger document.
    ///
    /// A fragment is always cut from the middle of a line of its document, so
    /// a template at its very start does not start a line.
    pub fn parse_fragment(&self, text: &str) -> Document {
        self.build(text, false)
    }

    /// Builds the document tree for `text`, which starts a line if
    /// `at_line_start` is true.
    fn build(&self, text: &str, at_line_start: bool) -> Document {
        let headings = Cell::new(0);
        Document {
            nodes: builder::build(text, self, &headings, true, at_line_start),
        }
    }
}

/// A preprocessor token.
///
/// Tokens do not carry text; the text of a token is the source text covered by
/// its span.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Token {
    /// A run of plain text.
    Text,
    /// `{{`
    TemplateOpen,
    /// `{{{`
    ArgOpen,
    /// `}}`
    TemplateClose,
    /// `}}}`
    ArgClose,
    /// `|`
    Pipe,
    /// `<`
    AngleOpen,
    /// `\n`
    Newline,
    /// `[[`
    LinkOpen,
    /// `]]`
    LinkClose,
    /// A run of `=`.
    Equals {
        /// The number of `=` characters in the run.
        len: usize,
        /// The run starts a line, so may open a heading.
        line_start: bool,
        /// The run is followed by only horizontal whitespace until the end of
        /// the line, so may close a heading.
        line_end: bool,
    },
}

/// A parsed document tree.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Document {
    /// The top-level nodes of the document, in source order.
    pub nodes: Vec<Node>,
}

impl Document {
    /// Returns true if the document has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// If the document consists of only one template argument, returns it.
    pub fn as_argument(&self) -> Option<&TemplateArgument> {
        if let [Node::Argument(argument)] = self.nodes.as_slice() {
            Some(argument)
        } else {
            None
        }
    }
}

/// A node in a document tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    /// A run of plain text.
    Text(String),
    /// A section heading.
    Heading {
        /// The heading content.
        title: Vec<Node>,
        /// The heading outline level.
        level: HeadingLevel,
        /// The syntax used to write the heading.
        kind: HeadingKind,
        /// The one-based position of the heading in the document.
        index: usize,
    },
    /// An extension tag.
    Extension(ExtensionTag),
    /// A template transclusion or parser function call.
    Template(Template),
    /// A template argument.
    Argument(TemplateArgument),
}

/// The syntax used to write a heading.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HeadingKind {
    /// `== Heading ==`
    EqualsSign,
    /// `<h2 attr="value">Heading</h2>`, with the unsanitised tag attributes.
    HtmlTag(Attributes),
}

/// A conversion error for out-of-range heading levels.
#[derive(Debug, thiserror::Error)]
#[error("{0} is not a valid HTML heading level")]
pub struct HeadingRangeError(u8);

/// A heading level.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    /// Returns the HTML tag name corresponding to this heading level.
    pub fn tag_name(self) -> &'static str {
        const TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
        TAGS[usize::from(self.0) - 1]
    }

    /// Creates a heading level from an unbounded delimiter count, clamping it
    /// into the valid range.
    pub(crate) fn clamped(level: usize) -> Self {
        Self(u8::try_from(level.clamp(1, 6)).unwrap_or(6))
    }
}

impl From<HeadingLevel> for u8 {
    fn from(value: HeadingLevel) -> Self {
        value.0
    }
}

impl From<HeadingLevel> for usize {
    fn from(value: HeadingLevel) -> Self {
        value.0.into()
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = HeadingRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=6).contains(&value) {
            Ok(Self(value))
        } else {
            Err(HeadingRangeError(value))
        }
    }
}

/// An extension tag.
///
/// ```wikitext
/// <name attr="value">content</name>
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtensionTag {
    /// The lowercased tag name.
    pub name: String,
    /// The tag attributes.
    pub attributes: Attributes,
    /// Whether the tag was self-closing.
    pub self_closing: bool,
    /// The raw tag content. Empty for a self-closing tag.
    pub content: String,
}

/// A template parameter key.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ParamKey {
    /// A positional parameter, numbered from 1.
    Positional(usize),
    /// A named parameter. A numeric name binds the same argument as the
    /// positional parameter with that number when the template is expanded.
    Named(String),
}

impl core::fmt::Display for ParamKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParamKey::Positional(index) => write!(f, "{index}"),
            ParamKey::Named(name) => f.write_str(name),
        }
    }
}

/// Ordered template parameters with raw, unexpanded values.
pub type Params = IndexMap<ParamKey, String>;

/// A template transclusion or parser function call.
///
/// ```wikitext
/// {{Name|positional|key=value}}
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Template {
    /// The raw template name, trimmed, with the first character upper-cased.
    pub name: String,
    /// The template parameters.
    pub params: Params,
    /// The original source text of the whole expression.
    pub source: String,
    /// Whether the expression starts a line of its source text.
    pub line_start: bool,
}

/// A template argument.
///
/// ```wikitext
/// {{{name|default}}}
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TemplateArgument {
    /// The raw argument name.
    pub name: String,
    /// The raw default value, if one was given.
    pub default: Option<String>,
}
