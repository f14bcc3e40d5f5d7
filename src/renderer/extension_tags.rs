//! Code for handling extension tags.
//!
//! Extension tags are the only way to emit some useful HTML, so their output
//! is inserted into the expanded text as-is. The body of an extension tag is
//! given to its hook raw; it is up to the hook to decide whether the body is
//! Wikitext which needs expanding (using [`Frame::expand_text`]).
//!
//! The parser only recognises extension tags which have a hook, so the set of
//! hooks has to be complete before the first page is parsed.

use super::{Error, Result, State, stack::Frame};
use crate::{
    common::{escape_no_wiki, strtr},
    sanitizer::render_attributes,
    wikitext::ExtensionTag,
};
use core::fmt;
use regex::RegexBuilder;
use std::{collections::HashMap, sync::LazyLock};

/// An extension tag hook.
pub trait TagHook: Send + Sync {
    /// Renders `tag` to HTML.
    fn call(&self, state: &mut State<'_>, sp: &Frame<'_>, tag: &ExtensionTag) -> Result<String>;
}

impl<F> TagHook for F
where
    F: Fn(&mut State<'_>, &Frame<'_>, &ExtensionTag) -> Result<String> + Send + Sync,
{
    fn call(&self, state: &mut State<'_>, sp: &Frame<'_>, tag: &ExtensionTag) -> Result<String> {
        self(state, sp, tag)
    }
}

/// A table of extension tag hooks, keyed by lowercased tag name.
#[derive(Default)]
pub struct TagHooks(HashMap<String, Box<dyn TagHook>>);

impl TagHooks {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with the built-in `<nowiki>` and `<pre>` hooks.
    pub fn with_defaults() -> Self {
        let mut hooks = Self::new();
        hooks.insert("nowiki", no_wiki);
        hooks.insert("pre", pre);
        hooks
    }

    /// Adds or replaces the hook for the tag `name`.
    pub fn insert(&mut self, name: &str, hook: impl TagHook + 'static) {
        self.0.insert(name.to_ascii_lowercase(), Box::new(hook));
    }

    /// Gets the hook for the tag `name`.
    pub fn get(&self, name: &str) -> Option<&dyn TagHook> {
        self.0.get(&name.to_ascii_lowercase()).map(Box::as_ref)
    }

    /// Returns an iterator over the registered tag names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Debug for TagHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Renders an extension tag. A hook error is rendered inline.
pub(super) fn render_extension_tag(
    state: &mut State<'_>,
    sp: &Frame<'_>,
    tag: &ExtensionTag,
) -> Result<String> {
    let Some(hook) = state.context.tags.get(&tag.name) else {
        log::warn!("no hook for extension tag <{}>", tag.name);
        return Ok(escape_no_wiki(&reconstruct(tag)).into_owned());
    };

    match hook.call(state, sp, tag) {
        Ok(html) => Ok(html),
        Err(Error::Fmt(err)) => Err(err.into()),
        Err(err) => {
            log::error!("<{}>: {err}", tag.name);
            Ok(format!(
                r#"<span class="error">{}</span>"#,
                html_escape::encode_text(&err.to_string())
            ))
        }
    }
}

/// Reconstructs the source text of an extension tag.
fn reconstruct(tag: &ExtensionTag) -> String {
    let attributes = render_attributes(&tag.attributes);
    if tag.self_closing {
        format!("<{}{attributes}/>", tag.name)
    } else {
        format!("<{}{attributes}>{}</{}>", tag.name, tag.content, tag.name)
    }
}

/// `<nowiki>`: emits the body as escaped literal text.
fn no_wiki(_state: &mut State<'_>, _sp: &Frame<'_>, tag: &ExtensionTag) -> Result<String> {
    Ok(escape_no_wiki(&tag.content).into_owned())
}

/// `<pre>`: emits the body as escaped preformatted text.
fn pre(state: &mut State<'_>, _sp: &Frame<'_>, tag: &ExtensionTag) -> Result<String> {
    // “Backwards-compatibility hack”
    static STRIP_NOWIKI: LazyLock<regex::Regex> = LazyLock::new(|| {
        RegexBuilder::new("<nowiki>(.*?)</nowiki>")
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .unwrap()
    });

    let attributes = state
        .context
        .sanitizer
        .fix_attributes(&render_attributes(&tag.attributes), "pre");
    let body = STRIP_NOWIKI.replace_all(&tag.content, "$1");
    let body = strtr(&body, &[("<", "&lt;"), (">", "&gt;")]);
    Ok(format!("<pre{}>{body}</pre>", render_attributes(&attributes)))
}
