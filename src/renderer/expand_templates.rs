//! A helper for expanding templates in a Wikitext fragment into an intermediate
//! container.

use super::{
    Error, Result, State, extension_tags,
    stack::Frame,
    surrogate::Surrogate,
    template,
};
use crate::{
    common::strip_tags,
    sanitizer::render_attributes,
    wikitext::{ExtensionTag, HeadingKind, HeadingLevel, Node, Template, TemplateArgument},
};
use core::fmt::Write as _;

/// Performs evaluation of a Wikitext document, expanding templates and
/// template arguments while converting all other nodes back into their
/// original Wikitext.
#[derive(Debug, Default)]
pub struct ExpandTemplates {
    /// The result of the evaluation.
    out: String,
}

impl ExpandTemplates {
    /// Creates a new [`ExpandTemplates`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes this object, returning the result.
    pub fn finish(self) -> String {
        self.out
    }
}

impl Surrogate<Error> for ExpandTemplates {
    fn adopt_argument(
        &mut self,
        state: &mut State<'_>,
        sp: &Frame<'_>,
        argument: &TemplateArgument,
    ) -> Result {
        template::call_argument(&mut self.out, state, sp, argument)
    }

    fn adopt_extension(&mut self, state: &mut State<'_>, sp: &Frame<'_>, tag: &ExtensionTag) -> Result {
        let html = extension_tags::render_extension_tag(state, sp, tag)?;
        self.out.write_str(&html)?;
        Ok(())
    }

    fn adopt_heading(
        &mut self,
        state: &mut State<'_>,
        sp: &Frame<'_>,
        level: HeadingLevel,
        kind: &HeadingKind,
        title: &[Node],
    ) -> Result {
        let title = {
            let mut inner = ExpandTemplates::new();
            inner.adopt_nodes(state, sp, title)?;
            inner.finish()
        };

        state.outline.push(level, strip_tags(&title).trim());

        match kind {
            HeadingKind::EqualsSign => {
                let marker = "=".repeat(level.into());
                write!(self.out, "{marker}{title}{marker}")?;
            }
            HeadingKind::HtmlTag(attributes) => {
                let tag = level.tag_name();
                let attributes = state
                    .context
                    .sanitizer
                    .fix_attributes(&render_attributes(attributes), tag);
                let attributes = render_attributes(&attributes);
                write!(self.out, "<{tag}{attributes}>{title}</{tag}>")?;
            }
        }
        Ok(())
    }

    fn adopt_template(&mut self, state: &mut State<'_>, sp: &Frame<'_>, template: &Template) -> Result {
        template::call_template(&mut self.out, state, sp, template)
    }

    fn adopt_text(&mut self, _state: &mut State<'_>, _sp: &Frame<'_>, text: &str) -> Result {
        self.out.write_str(text)?;
        Ok(())
    }
}
