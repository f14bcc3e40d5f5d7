//! Renderer stack management types and functions.

use super::{Error, Result, State, expand_templates::ExpandTemplates, surrogate::Surrogate};
use crate::{
    title::Title,
    wikitext::{Document, ParamKey, Params},
};
use core::fmt;
use indexmap::IndexMap;
use std::{cell::RefCell, collections::HashMap};

/// A template transclusion stack frame.
#[derive(Default)]
pub struct Frame<'a> {
    /// The title of the article rendered by this frame. The root frame of an
    /// ad-hoc expansion has no title.
    title: Option<Title>,
    /// The arguments passed in from the parent.
    arguments: Arguments,
    /// The number of template frames between this frame and the root.
    depth: usize,
    /// The parent stack frame.
    parent: Option<&'a Frame<'a>>,
}

impl<'a> Frame<'a> {
    /// Creates a new root stack frame.
    pub fn new(title: Option<Title>, arguments: Arguments) -> Self {
        Self {
            title,
            arguments,
            depth: 0,
            parent: None,
        }
    }

    /// Creates a new stack frame for the given template title, with this frame
    /// as its parent.
    ///
    /// Fails if the template is already being expanded somewhere up the stack,
    /// the stack is too deep, or the render has run out of time.
    pub fn chain(&'a self, state: &State<'_>, title: Title, arguments: Arguments) -> Result<Self> {
        check_recursion(self, &title, state.context.config.limits.max_depth)?;

        if state.is_expired() {
            log::error!(
                "time limit ({}) exceeded expanding {title}",
                super::format_timeout(state.context.config.limits.timeout)
            );
            return Err(Error::Timeout(title.to_string()));
        }

        Ok(Self {
            title: Some(title),
            arguments,
            depth: self.depth + 1,
            parent: Some(self),
        })
    }

    /// The bound arguments of this frame.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// The number of template frames between this frame and the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The parent frame.
    pub fn parent(&self) -> Option<&Frame<'a>> {
        self.parent
    }

    /// The title of the article rendered by this frame.
    pub fn title(&self) -> Option<&Title> {
        self.title.as_ref()
    }

    /// Expands all the templates and arguments in `document` in the scope of
    /// this stack frame.
    pub fn expand(&self, state: &mut State<'_>, document: &Document) -> Result<String> {
        let mut evaluator = ExpandTemplates::new();
        evaluator.adopt_nodes(state, self, &document.nodes)?;
        Ok(evaluator.finish())
    }

    /// Parses and expands a fragment of Wikitext in the scope of this stack
    /// frame.
    pub fn expand_text(&self, state: &mut State<'_>, text: &str) -> Result<String> {
        if !text.contains(['{', '<', '=']) {
            return Ok(text.to_string());
        }

        let document = state.parser.parse_fragment(text);
        self.expand(state, &document)
    }

    /// Evaluates the argument with the given key.
    ///
    /// The argument value is expanded in the parent frame, since that is where
    /// it was written.
    pub fn argument(&self, state: &mut State<'_>, key: &str) -> Result<Option<String>> {
        let Some(raw) = self.arguments.raw.get(key) else {
            return Ok(None);
        };

        if let Some(value) = self.arguments.cache.borrow().get(key) {
            return Ok(Some(value.clone()));
        }

        let value = match self.parent {
            Some(parent) => parent.expand_text(state, &raw.value)?,
            None => Frame::default().expand_text(state, &raw.value)?,
        };

        let value = if raw.is_named {
            value.trim_ascii().to_string()
        } else {
            value
        };

        self.arguments
            .cache
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(Some(value))
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("title", &self.title)
            .field("arguments", &self.arguments)
            .field("depth", &self.depth)
            .field(
                "parent",
                &self
                    .parent
                    .and_then(|parent| parent.title.as_ref())
                    .map(Title::key),
            )
            .finish()
    }
}

/// A raw template argument value.
#[derive(Clone, Debug)]
struct RawValue {
    /// The unexpanded value.
    value: String,
    /// Whether the argument was given by name. Named argument values are
    /// trimmed after expansion.
    is_named: bool,
}

/// The arguments bound to a stack frame, with a cache of expanded values.
#[derive(Debug, Default)]
pub struct Arguments {
    /// The raw values, keyed by the expanded argument name.
    raw: IndexMap<String, RawValue>,
    /// Expanded argument values.
    cache: RefCell<HashMap<String, String>>,
}

impl Arguments {
    /// Binds template parameters to argument keys.
    ///
    /// Parameter names may contain templates, so are expanded in the `caller`
    /// frame. If the same key is given more than once, the last one wins.
    pub fn bind(state: &mut State<'_>, caller: &Frame<'_>, params: &Params) -> Result<Self> {
        let mut raw = IndexMap::with_capacity(params.len());
        for (key, value) in params {
            let (key, is_named) = match key {
                ParamKey::Positional(index) => (index.to_string(), false),
                ParamKey::Named(name) => (caller.expand_text(state, name)?.trim().to_string(), true),
            };
            raw.insert(
                key,
                RawValue {
                    value: value.clone(),
                    is_named,
                },
            );
        }

        Ok(Self {
            raw,
            cache: <_>::default(),
        })
    }

    /// Returns true if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns an iterator over the argument keys, in the order they were
    /// first given.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.raw.keys().map(String::as_str)
    }
}

/// Checks whether `title` can be expanded in a new frame on top of `sp`.
///
/// Loops are checked before depth so that a self-transcluding template is
/// always reported as a loop.
fn check_recursion(sp: &Frame<'_>, title: &Title, max_depth: usize) -> Result<(), Error> {
    let mut frame = sp;
    while let Some(parent) = frame.parent {
        if frame.title.as_ref() == Some(title) {
            debug_backtrace(title, sp);
            return Err(Error::TemplateRecursion(title.to_string()));
        }
        frame = parent;
    }

    if sp.depth >= max_depth {
        debug_backtrace(title, sp);
        return Err(Error::StackOverflow(title.to_string()));
    }

    Ok(())
}

/// Emits a stack backtrace to the error log.
fn debug_backtrace(title: &Title, mut sp: &Frame<'_>) {
    let mut index = 0;
    log::error!("{index:>2}. {title}");
    loop {
        index += 1;
        match &sp.title {
            Some(title) => log::error!("{index:>2}. {title}"),
            None => log::error!("{index:>2}. <root>"),
        }
        if let Some(parent) = sp.parent {
            sp = parent;
        } else {
            break;
        }
    }
}
