//! The persisted page bundle (spec §6 "page bundle", SPEC_FULL §B): the
//! wire shape a host stores or transmits between a wt2html run and a later
//! html2wt run, since the DOM Data Store itself (C2) lives only as long as
//! its owning document.
//!
//! `validate()` is the one piece of business logic the wire format needs
//! beyond what `serde` already enforces by typing `data-parsoid` as
//! required: whether `data-mw.ids` must be present depends on the bundle's
//! `version` field (spec §6), a cross-field rule `serde` cannot express on
//! its own.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data_mw::DataMw;
use crate::error::{Error, Result};
use crate::parsoid_data::DataParsoid;

/// A `{ids: {nodeId -> T}}` wrapper, the shape both `data-parsoid` and
/// `data-mw` take inside a page bundle (spec §6).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdsMap<T> {
    /// The per-node payload, keyed by the node id (spec §3.3) as a string
    /// (JSON object keys are always strings).
    pub ids: HashMap<String, T>,
}

/// The page bundle: `{ html, data-parsoid: {ids}, data-mw: {ids}, version }`
/// (spec §6).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBundle {
    /// The serialized document, as produced by the XML/HTML5 serializer (C1).
    pub html: String,
    /// Every node's `data-parsoid` bookkeeping, by node id. Always present;
    /// `data-parsoid.ids` is unconditionally required (spec §6).
    #[serde(rename = "data-parsoid")]
    pub data_parsoid: IdsMap<DataParsoid>,
    /// Every encapsulation wrapper's `data-mw` payload, by node id.
    /// Required only for bundles whose `version` satisfies `^999.0.0`
    /// (spec §6); absent otherwise.
    #[serde(rename = "data-mw", skip_serializing_if = "Option::is_none")]
    pub data_mw: Option<IdsMap<DataMw>>,
    /// The page bundle content version, e.g. `"999.0.0"`.
    pub version: String,
}

impl PageBundle {
    /// Checks the cross-field rule spec §6 describes, returning
    /// [`Error::Validation`] in place of the "`validate()` returns false
    /// with `errorMessage` set" contract (spec §7's `ValidationError`): no
    /// partial result is produced either way, since this never mutates
    /// `self`.
    pub fn validate(&self) -> Result<()> {
        if requires_data_mw_ids(&self.version) && self.data_mw.is_none() {
            return Err(Error::Validation(format!(
                "page bundle version {} requires data-mw.ids but none was present",
                self.version
            )));
        }
        Ok(())
    }
}

/// Returns true if `version`'s major component is `999`, the caret range
/// `^999.0.0` spec §6 names for when `data-mw.ids` becomes mandatory.
fn requires_data_mw_ids(version: &str) -> bool {
    version.split('.').next() == Some("999")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(version: &str, data_mw: Option<IdsMap<DataMw>>) -> PageBundle {
        PageBundle {
            html: "<body></body>".to_owned(),
            data_parsoid: IdsMap { ids: HashMap::new() },
            data_mw,
            version: version.to_owned(),
        }
    }

    #[test]
    fn test_old_version_does_not_require_data_mw_ids() {
        let bundle = bundle("2.4.0", None);
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_999_version_requires_data_mw_ids() {
        let bundle = bundle("999.0.0", None);
        let err = bundle.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_999_version_with_data_mw_ids_present_is_valid() {
        let bundle = bundle(
            "999.1.3",
            Some(IdsMap {
                ids: HashMap::new(),
            }),
        );
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_serde_roundtrip_uses_hyphenated_keys() {
        let bundle = bundle("999.0.0", Some(IdsMap { ids: HashMap::new() }));
        let json = serde_json::to_value(&bundle).unwrap();
        assert!(json.get("data-parsoid").is_some());
        assert!(json.get("data-mw").is_some());
        let back: PageBundle = serde_json::from_value(json).unwrap();
        assert_eq!(back, bundle);
    }
}
