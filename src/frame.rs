//! The `Frame` external collaborator (spec §6): the current source text a
//! token's `tsr` indexes into.

use crate::span::Span;

/// Carries the wikitext source text being tokenized, so a token's `tsr` can
/// be resolved back to its original substring.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    source: &'a str,
}

impl<'a> Frame<'a> {
    /// Creates a new frame over `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Returns the full source text.
    #[must_use]
    pub fn get_src_text(&self) -> &'a str {
        self.source
    }

    /// Returns the substring covered by `span`, or `None` if it is out of
    /// bounds or not on a `char` boundary.
    #[must_use]
    pub fn text_at(&self, span: Span) -> Option<&'a str> {
        self.source.get(span.into_range())
    }
}
