//! The `data-mw` payload shape (spec §3.3, §4.4 step 8): opaque
//! template/extension bookkeeping carried on an encapsulation wrapper's first
//! element, keyed indirectly through [`crate::dom::store::DomDataStore`] the
//! same way `data-parsoid` is.

use crate::parsoid_data::TemplatedAttrib;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The `data-mw` JSON payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataMw {
    /// The extension tag name, for `mw:Extension/<name>` wrappers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The extension tag's source attributes, in source order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, String>,
    /// The extension tag's body, for `mw:Extension/<name>` wrappers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<ExtBody>,
    /// Per-attribute templating provenance, for `mw:ExpandedAttrs` wrappers
    /// (spec §4.4 step 8).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribs: Option<Vec<TemplatedAttrib>>,
    /// Raw `parts` array, for `mw:Transclusion` wrappers. The template
    /// expander that would populate this meaningfully is out of scope (spec
    /// §1); this crate treats it as an opaque passthrough value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<serde_json::Value>,
    /// Any other keys a collaborator stashed.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An extension tag's body (spec §4.4, the poem/extension example in §8).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtBody {
    /// The raw, unexpanded source of the extension's body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extsrc: Option<String>,
    /// The expanded HTML of the extension's body, when the extension
    /// handler (out of scope) has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}
