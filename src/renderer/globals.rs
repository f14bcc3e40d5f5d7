//! Collections for semi-structured article data.

use crate::{common::anchor_encode, wikitext::HeadingLevel};
use core::fmt;

/// An article outline (table of contents).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Outline(Vec<(HeadingLevel, String)>);

impl Outline {
    /// Push a new entry to the outline at the given heading level.
    pub(super) fn push(&mut self, level: HeadingLevel, name: &str) {
        self.0.push((level, name.to_string()));
    }

    /// The outline entries, in document order.
    pub fn entries(&self) -> &[(HeadingLevel, String)] {
        &self.0
    }

    /// Returns true if there are no entries in the outline.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Outline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }

        write!(f, r##"<ul><li><a href="#">(Top)</a></li>"##)?;
        let mut current = 2;
        for (level, name) in &self.0 {
            // Level 1 headings are listed alongside level 2 headings
            let level = u8::from(*level).max(2);
            while current > level {
                write!(f, "</ul>")?;
                current -= 1;
            }
            while current < level {
                write!(f, "<ul>")?;
                current += 1;
            }
            write!(
                f,
                r##"<li><a href="#{}">{}</a></li>"##,
                anchor_encode(name),
                html_escape::encode_text_minimal(name)
            )?;
        }
        while current > 1 {
            write!(f, "</ul>")?;
            current -= 1;
        }
        Ok(())
    }
}
