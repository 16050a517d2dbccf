//! The error kinds named in spec §7.
//!
//! Handlers that can recover from malformed input do not construct these at
//! all — they log and fall back (see [`crate::html2wt::meta`] and
//! [`crate::attr_expander`]). These variants exist for the entry points that
//! have run out of fallback options.

/// An error produced by this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Unexpected token or attribute shape with no fallback left to try
    /// (e.g. a `data-parsoid`/`data-mw` attribute that is not valid JSON
    /// when loading a document). Handlers elsewhere recover from this kind
    /// of problem by logging and falling back instead of constructing this
    /// variant.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// An internal contract was broken (e.g. the attribute expander lost a
    /// hoisted meta's provenance). Callers should treat this as a bug.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Template expansion returned no value, or the retry loop in
    /// [`crate::attr_expander`] exceeded its depth bound.
    #[error("expansion limit exceeded")]
    ExpansionLimit,

    /// A serializer handler encountered a shape it cannot model.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// Page bundle validation failed.
    #[error("page bundle validation failed: {0}")]
    Validation(String),

    /// Formatting into a [`crate::html2wt::SerializerState`] failed.
    #[error(transparent)]
    Fmt(#[from] core::fmt::Error),
}

/// A specialised [`Result`](core::result::Result) using [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
