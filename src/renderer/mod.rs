//! Template expansion types and functions.
//!
//! When processing a Wikitext document, the smallest atom is a Wikitext token,
//! but the smallest atom that a template can produce is a *character*. This
//! means that a Wikitext document can only be expanded correctly by an
//! algorithm that operates as-if this sequence of steps is run in order:
//!
//! 1. Remove comments and process inclusion control pseudo-XML tags
//!    (`<noinclude>`, `<onlyinclude>`, and `<includeonly>`) according to
//!    whether the document is being viewed or transcluded. The bodies of
//!    registered extension tags are opaque to this step.
//!
//! 2. Build a document tree of template expressions, template parameters,
//!    extension tags, and headings. Everything else is plain text.
//!
//! 3. Recursively expand template expressions:
//!
//!    Conceptually, the result of a template expansion should be as-if the
//!    plain text of the *fully expanded* template already existed in the
//!    root document’s source text before parsing ever began.
//!
//!    If the expression is a template parameter, interpolate into the source
//!    text:
//!
//!       1. The expansion of the matching argument from the parent; otherwise
//!       2. The expansion of the default value from the parameter; otherwise
//!       3. The template parameter expression itself, as plain text.
//!
//!    If the expression is a template, interpolate into the source text:
//!
//!    1. If the expression is prefixed by `subst:` or `safesubst:`, remove the
//!       prefix from the expression[^1]; then
//!    2. If the expression has no arguments, and it matches a variable name,
//!       the variable’s value; otherwise
//!    3. If the target-part of the expression contains a `:`, and the part
//!       before the `:` matches a parser function, and calling the parser
//!       function succeeds, the result of the parser function; otherwise
//!    4. If the target-part of the expression is a valid and existing template
//!       which is not already being expanded, the result of expanding the
//!       template; otherwise
//!    5. If the target-part of the expression is a valid but non-existing
//!       template, a link to the missing template; otherwise
//!    6. The template expression itself, as plain text.
//!
//!    [^1]: Save mode, and therefore the other `subst` rules, are out of scope
//!          for this project.
//!
//! 4. Convert pipe-table markup in the fully expanded text to HTML.

use crate::{
    config::Configuration,
    sanitizer::{AttributeSanitizer, Sanitizer},
    title::{InvalidTitle, Namespace, Title},
    wikitext::{Document, Params, Parser, handle_tables},
};
use core::fmt;
pub use expand_templates::ExpandTemplates;
pub use extension_tags::{TagHook, TagHooks};
pub use globals::Outline;
pub use hooks::{
    ContentSource, CoreFunctions, FunctionArgs, MagicVariables, NoFunctions, NoVariables,
    ParserFunctions,
};
pub use stack::{Arguments, Frame};
use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};
pub use surrogate::Surrogate;

mod expand_templates;
mod extension_tags;
mod globals;
mod hooks;
mod stack;
mod surrogate;
mod template;

/// A template expansion error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An extension tag error.
    #[error(transparent)]
    Extension(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A write to a buffer failed.
    #[error("fmt error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Too many nested template calls.
    #[error("template stack overflow: {0}")]
    StackOverflow(String),

    /// A template called back into itself.
    ///
    /// Note that loop detection does not (and must not) apply in cases where the
    /// loop is back to the root page, because this is used by (at least) all
    /// pages which use 'Template:Documentation' to demonstrate the output of
    /// a template from its own page.
    #[error("template loop detected: {0}")]
    TemplateRecursion(String),

    /// The time limit for rendering the page ran out.
    #[error("template expansion timed out: {0}")]
    Timeout(String),

    /// A page title was not valid.
    #[error("invalid title: {0}")]
    Title(#[from] InvalidTitle),
}

/// The standard result type used by all fallible renderer functions.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// The default extension tag hooks.
static DEFAULT_TAGS: LazyLock<TagHooks> = LazyLock::new(TagHooks::with_defaults);

/// External collaborators used during template expansion.
///
/// Everything here is shared and read-only, so one context can be used by
/// many renders at once.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// The wiki configuration.
    pub config: &'a Configuration,
    /// The source of template text.
    pub content: &'a dyn ContentSource,
    /// The parser function implementations.
    pub functions: &'a dyn ParserFunctions,
    /// The magic variable implementations.
    pub variables: &'a dyn MagicVariables,
    /// The extension tag hooks. Only tags with hooks are recognised by the
    /// parser.
    pub tags: &'a TagHooks,
    /// The HTML attribute sanitiser.
    pub sanitizer: &'a dyn AttributeSanitizer,
}

impl<'a> Context<'a> {
    /// Creates a new context with the core parser functions, no magic
    /// variables, the default extension tags, and the default sanitiser.
    pub fn new(config: &'a Configuration, content: &'a dyn ContentSource) -> Self {
        Self {
            config,
            content,
            functions: &CoreFunctions,
            variables: &NoVariables,
            tags: &DEFAULT_TAGS,
            sanitizer: &Sanitizer,
        }
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Renderer state for a single page render.
pub struct State<'s> {
    /// The external collaborators.
    pub context: &'s Context<'s>,
    /// The preprocessor.
    pub parser: &'s Parser,
    /// Table of contents.
    pub outline: Outline,
    /// The number of template expressions expanded so far.
    pub expansions: usize,
    /// The time after which no more templates will be expanded.
    deadline: Option<Instant>,
}

impl<'s> State<'s> {
    /// Creates fresh state for a render which starts now.
    fn new(context: &'s Context<'s>, parser: &'s Parser) -> Self {
        Self {
            context,
            parser,
            outline: Outline::default(),
            expansions: 0,
            deadline: context
                .config
                .limits
                .timeout
                .map(|timeout| Instant::now() + timeout),
        }
    }

    /// Returns true if the render has run out of time.
    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// The output of a page render.
#[derive(Debug)]
pub struct RenderOutput {
    /// The rendered content.
    pub content: String,
    /// The page headings, in document order.
    pub outline: Outline,
}

/// A page renderer.
#[derive(Debug)]
pub struct Renderer<'a> {
    /// The external collaborators.
    context: Context<'a>,
    /// The preprocessor, configured with the extension tags of the context.
    parser: Parser,
}

impl<'a> Renderer<'a> {
    /// Creates a new renderer.
    pub fn new(context: Context<'a>) -> Self {
        let parser = Parser::new(context.tags.names());
        Self { context, parser }
    }

    /// The preprocessor used by this renderer.
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Renders the page `text` with the given `title`.
    ///
    /// Malformed markup, missing templates, and runaway templates are all
    /// rendered inline, so this only fails if `title` is invalid.
    pub fn render(&self, title: &str, text: &str) -> Result<RenderOutput> {
        let title = Title::new(title, Namespace::MAIN, self.context.config)?;
        log::debug!("rendering {title}");

        let document = self.parser.preprocess_to_obj(text, false);
        let mut state = State::new(&self.context, &self.parser);
        let root = Frame::new(Some(title), Arguments::default());
        let expanded = root.expand(&mut state, &document)?;

        log::trace!("{} template expressions expanded", state.expansions);

        Ok(RenderOutput {
            content: handle_tables(&expanded, self.context.sanitizer),
            outline: state.outline,
        })
    }

    /// Expands the templates in `document` in a root frame with no title,
    /// bound to the given arguments.
    pub fn expand(&self, document: &Document, parent_args: Option<&Params>) -> Result<String> {
        let mut state = State::new(&self.context, &self.parser);
        let arguments = match parent_args {
            Some(params) => Arguments::bind(&mut state, &Frame::default(), params)?,
            None => Arguments::default(),
        };
        Frame::new(None, arguments).expand(&mut state, document)
    }
}

/// Formats an expansion time limit for log messages.
fn format_timeout(timeout: Option<Duration>) -> String {
    timeout.map_or_else(|| "none".into(), |timeout| format!("{timeout:?}"))
}
