//! Helper trait for implementing document tree walkers.
//!
//! The design approach taken here was to consider the design of Wikitext where
//! templates would be interpolated into the root Wikitext string and then the
//! whole thing would be re-parsed as a complete Wikitext document. As a
//! structured tree, the same thing can be accomplished by simply emitting
//! nodes up through an arbitrary chain of [`Surrogate`] implementations until
//! they reach the root. If any step returns an error, the entire stack
//! unwinds.

use super::{State, stack::Frame};
use crate::wikitext::{ExtensionTag, HeadingKind, HeadingLevel, Node, Template, TemplateArgument};

/// A trait for implementing document tree walkers.
pub trait Surrogate<E> {
    /// Visits a [`Node::Argument`].
    fn adopt_argument(
        &mut self,
        state: &mut State<'_>,
        sp: &Frame<'_>,
        argument: &TemplateArgument,
    ) -> Result<(), E>;

    /// Visits a [`Node::Extension`].
    fn adopt_extension(
        &mut self,
        state: &mut State<'_>,
        sp: &Frame<'_>,
        tag: &ExtensionTag,
    ) -> Result<(), E>;

    /// Visits a [`Node::Heading`].
    #[inline]
    fn adopt_heading(
        &mut self,
        state: &mut State<'_>,
        sp: &Frame<'_>,
        _level: HeadingLevel,
        _kind: &HeadingKind,
        title: &[Node],
    ) -> Result<(), E> {
        self.adopt_nodes(state, sp, title)
    }

    /// Visits a [`Node::Template`].
    fn adopt_template(
        &mut self,
        state: &mut State<'_>,
        sp: &Frame<'_>,
        template: &Template,
    ) -> Result<(), E>;

    /// Visits a [`Node::Text`].
    fn adopt_text(&mut self, state: &mut State<'_>, sp: &Frame<'_>, text: &str) -> Result<(), E>;

    /// Visits a single node.
    fn adopt_node(&mut self, state: &mut State<'_>, sp: &Frame<'_>, node: &Node) -> Result<(), E> {
        match node {
            Node::Text(text) => self.adopt_text(state, sp, text),
            Node::Heading {
                title, level, kind, ..
            } => self.adopt_heading(state, sp, *level, kind, title),
            Node::Extension(tag) => self.adopt_extension(state, sp, tag),
            Node::Template(template) => self.adopt_template(state, sp, template),
            Node::Argument(argument) => self.adopt_argument(state, sp, argument),
        }
    }

    /// Visits a list of nodes, in order.
    #[inline]
    fn adopt_nodes(&mut self, state: &mut State<'_>, sp: &Frame<'_>, nodes: &[Node]) -> Result<(), E> {
        for node in nodes {
            self.adopt_node(state, sp, node)?;
        }
        Ok(())
    }
}
