//! The `data-parsoid` shape (spec §3.3): source-range and syntax bookkeeping
//! that travels with a token from the moment it is minted all the way through
//! to the DOM element the (external) tree builder turns it into.
//!
//! Because a token's `data_attribs` and an element's side-band `data-parsoid`
//! are the same JSON shape at two different pipeline stages, both
//! [`crate::token::TagToken`] and [`crate::dom::store::DomDataStore`] share
//! this one type rather than keeping parallel structs in sync by hand.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Source-range and syntax bookkeeping attached to a token or DOM element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataParsoid {
    /// The token source range, `[start, end]` into the frame's source. Named
    /// `tsr` prior to tree-building and folded into [`Self::dsr`] afterward;
    /// kept as one field since this crate does not run the tree builder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsr: Option<Span>,
    /// The document source range once the tree builder has paired this
    /// token's start and end tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsr: Option<(usize, usize, Option<usize>, Option<usize>)>,
    /// A syntax hint (e.g. which wikitext construct this was serialized
    /// from, when more than one wikitext form maps to the same token).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stx: Option<String>,
    /// The original source text, when preserved verbatim (placeholders,
    /// extension tags that failed to expand).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// The wikitext source of a magic word a `<meta>` stands in for, used by
    /// the meta serializer handler's fallback branch (spec §4.5 step 2).
    #[serde(rename = "magicSrc", skip_serializing_if = "Option::is_none")]
    pub magic_src: Option<String>,
    /// Whether the opening tag was not present in the source and was
    /// synthesized by tree-building repair.
    #[serde(
        rename = "autoInsertedStart",
        default,
        skip_serializing_if = "core::ops::Not::not"
    )]
    pub auto_inserted_start: bool,
    /// Whether the closing tag was not present in the source and was
    /// synthesized by tree-building repair.
    #[serde(
        rename = "autoInsertedEnd",
        default,
        skip_serializing_if = "core::ops::Not::not"
    )]
    pub auto_inserted_end: bool,
    /// The source substring from a hoisted encapsulation meta's new position
    /// back to its original one (spec §4.4 step 4). A direct field of the
    /// bookkeeping, not of [`Tmp`]: it is meant to survive onto the
    /// serialized `data-parsoid` attribute, unlike everything in `tmp`.
    #[serde(rename = "unwrappedWT", skip_serializing_if = "Option::is_none")]
    pub unwrapped_wt: Option<String>,
    /// Parser-internal scratch data that never round-trips into the
    /// serialized `data-parsoid` attribute (SPEC_FULL §B).
    #[serde(default, skip_serializing_if = "Tmp::is_empty")]
    pub tmp: Tmp,
    /// Any other keys a collaborator stashed; preserved but otherwise opaque
    /// to this crate.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DataParsoid {
    /// Returns a copy with [`Self::tmp`] cleared, the shape flushed onto an
    /// element's `data-parsoid` attribute prior to serialization (SPEC_FULL
    /// §B: `tmp` is parser-internal and never round-trips).
    #[must_use]
    pub fn without_tmp(&self) -> Self {
        Self {
            tmp: Tmp::default(),
            ..self.clone()
        }
    }
}

/// Parser-internal scratch data (`data-parsoid.tmp`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tmp {
    /// Attribute provenance for a `template` token, stashed here instead of
    /// in `data-mw` because the template handler (out of scope) consumes it
    /// before the token becomes an element (spec §4.4, final paragraph).
    #[serde(rename = "templatedAttribs", skip_serializing_if = "Option::is_none")]
    pub templated_attribs: Option<Vec<TemplatedAttrib>>,
    /// Any other scratch keys a collaborator stashed.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Tmp {
    fn is_empty(&self) -> bool {
        self.templated_attribs.is_none() && self.extra.is_empty()
    }
}

/// One `{k, v}` entry of a `data-mw.attribs` array (spec §4.4 step 8,
/// SPEC_FULL §B).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatedAttrib {
    /// The attribute key's provenance.
    pub k: AttribPart,
    /// The attribute value's provenance.
    pub v: AttribPart,
}

/// One side (key or value) of a [`TemplatedAttrib`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttribPart {
    /// The plain-text form, if the side is a resolved string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txt: Option<String>,
    /// The serialized original HTML fragment, if the side carried templated
    /// content. An empty string here (as opposed to `None`) means "serialized
    /// to nothing"; `html: []`-shaped emptiness in the source system is
    /// modeled as `None` (SPEC_FULL §B, Open Question 3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Source offsets of this side, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_offsets: Option<[usize; 2]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_tmp_clears_only_tmp() {
        let mut dp = DataParsoid {
            stx: Some("html".to_owned()),
            ..Default::default()
        };
        dp.tmp.templated_attribs = Some(vec![TemplatedAttrib::default()]);
        let flushed = dp.without_tmp();
        assert_eq!(flushed.stx.as_deref(), Some("html"));
        assert!(flushed.tmp.templated_attribs.is_none());
    }

    #[test]
    fn test_serde_roundtrip_skips_empty_tmp() {
        let dp = DataParsoid {
            dsr: Some((0, 10, Some(1), Some(2))),
            auto_inserted_end: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&dp).unwrap();
        assert!(json.get("tmp").is_none());
        assert_eq!(json["autoInsertedEnd"], serde_json::json!(true));
        assert!(json.get("autoInsertedStart").is_none());
        let back: DataParsoid = serde_json::from_value(json).unwrap();
        assert_eq!(back, dp);
    }
}
