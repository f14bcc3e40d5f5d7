//! A MediaWiki-compatible wikitext preprocessor.
//!
//! The pipeline is:
//!
//! 1. [`wikitext::Parser::preprocess_to_obj`] strips inclusion control tags and
//!    comments, tokenises the text, and builds a [`wikitext::Document`];
//! 2. [`renderer::Frame::expand`] walks the document, transcluding templates
//!    from a [`renderer::ContentSource`] and substituting template arguments;
//! 3. [`wikitext::handle_tables`] converts pipe-table markup in the expanded
//!    text into HTML.
//!
//! [`renderer::Renderer`] wires all of these together.

pub mod common;
pub mod config;
pub mod renderer;
pub mod sanitizer;
pub mod title;
pub mod wikitext;

pub use config::{Configuration, Limits};
pub use renderer::{Context, Frame, RenderOutput, Renderer};
pub use wikitext::{Document, Node, Parser, handle_tables};
