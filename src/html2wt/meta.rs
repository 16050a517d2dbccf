//! The meta serializer handler (C5a, spec §4.5): the decision tree for any
//! `<meta>` element encountered during html2wt.
//!
//! Grounded in the teacher's `renderer::tags` dispatch-by-name style (see
//! `src/renderer/tags.rs`), but expressed as a flat sequence of guard
//! clauses rather than a match table, since the five branches here test
//! overlapping predicates (`typeof`, `property`) rather than a single tag
//! name.

use core::fmt::Write as _;

use crate::dom::store::DomDataStore;
use crate::dom::Handle;
use crate::env::{Env, MAGIC_MASQ};
use crate::error::Result;
use crate::frame::Frame;
use crate::html2wt::SerializerState;

/// Dispatches a `<meta>` element through spec §4.5's five branches.
pub fn handle(
    node: &Handle,
    state: &mut SerializerState,
    store: &DomDataStore,
    env: &dyn Env,
    frame: Option<&Frame<'_>>,
) -> Result<()> {
    let dp = store.data_parsoid(node, env);
    let dmw = store.data_mw(node, env);
    let types: Vec<String> = node
        .get_attr("typeof")
        .map(|t| t.split_ascii_whitespace().map(str::to_owned).collect())
        .unwrap_or_default();

    // Branch 1: a placeholder with preserved source wins outright.
    if let Some(src) = &dp.src {
        if has_mw_prefix(&types, "Placeholder") {
            write!(state, "{src}")?;
            return Ok(());
        }
    }

    // Branch 2: page properties, the "magic masq" / magic-word split.
    if let Some(prop) = node.get_attr("property") {
        if let Some(name) = prop.strip_prefix("mw:PageProp/") {
            return handle_page_prop(node, state, &dp, env, name, &types);
        }
    }

    // Branch 3: include boundaries.
    if let Some(kind) = include_kind(&types) {
        return handle_includes(state, &dp, dmw.as_ref(), kind);
    }

    // Branch 4: diff/separator markers carry no wikitext of their own.
    if types.iter().any(|t| {
        t.strip_prefix("mw:")
            .is_some_and(|rest| rest.starts_with("DiffMarker") || rest == "Separator")
    }) {
        return Ok(());
    }

    // Branch 5: nothing matched; fall through to the generic handler.
    (crate::html2wt::generic_handler().handle)(node, state, store, env, frame)
}

fn has_mw_prefix(types: &[String], prefix: &str) -> bool {
    types.iter().any(|t| {
        t.strip_prefix("mw:")
            .is_some_and(|rest| rest == prefix || rest.starts_with(&format!("{prefix}/")))
    })
}

fn handle_page_prop(
    node: &Handle,
    state: &mut SerializerState,
    dp: &crate::parsoid_data::DataParsoid,
    env: &dyn Env,
    name: &str,
    types: &[String],
) -> Result<()> {
    let lower = name.to_ascii_lowercase();
    if MAGIC_MASQ.contains(lower.as_str()) {
        let raw_content = node.get_attr("content").unwrap_or_default();
        let content = crate::common::decode_html(&raw_content);
        if types.iter().any(|t| t == "mw:ExpandedAttrs") {
            write!(state, "{{{{{content}}}}}")?;
        } else if let Some(src) = &dp.src {
            let prefix_end = src.find(':').map_or(src.len(), |i| i + 1);
            write!(state, "{}{content}}}}}", &src[..prefix_end])?;
        } else {
            env.log(
                log::Level::Warn,
                &format_args!("page-prop mw:PageProp/{name} has no data-parsoid.src; synthesizing a template form"),
            );
            write!(state, "{{{{{}:{content}}}}}", name.to_ascii_uppercase())?;
        }
        return Ok(());
    }

    if let Some(src) = &dp.magic_src {
        write!(state, "{src}")?;
    } else if let Some(src) = env.magic_word_source(&lower) {
        write!(state, "{src}")?;
    } else {
        env.log(
            log::Level::Warn,
            &format_args!("page-prop mw:PageProp/{name} has no known magic-word source; dropping"),
        );
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum IncludeKind {
    IncludeOnlyStart,
    IncludeOnlyEnd,
    NoIncludeStart,
    NoIncludeEnd,
    OnlyIncludeStart,
    OnlyIncludeEnd,
}

fn include_kind(types: &[String]) -> Option<IncludeKind> {
    types.iter().find_map(|t| {
        let rest = t.strip_prefix("mw:Includes/")?;
        match rest {
            "IncludeOnly" => Some(IncludeKind::IncludeOnlyStart),
            "IncludeOnly/End" => Some(IncludeKind::IncludeOnlyEnd),
            "NoInclude" => Some(IncludeKind::NoIncludeStart),
            "NoInclude/End" => Some(IncludeKind::NoIncludeEnd),
            "OnlyInclude" => Some(IncludeKind::OnlyIncludeStart),
            "OnlyInclude/End" => Some(IncludeKind::OnlyIncludeEnd),
            _ => None,
        }
    })
}

fn handle_includes(
    state: &mut SerializerState,
    dp: &crate::parsoid_data::DataParsoid,
    dmw: Option<&crate::data_mw::DataMw>,
    kind: IncludeKind,
) -> Result<()> {
    // The closing `</includeonly>` boundary emits nothing; its opening tag
    // (or `dp.src`/`dmw.src` override) already carried the full wrapped text.
    if matches!(kind, IncludeKind::IncludeOnlyEnd) {
        return Ok(());
    }
    let default = match kind {
        IncludeKind::IncludeOnlyStart => "<includeonly>",
        IncludeKind::NoIncludeStart => "<noinclude>",
        IncludeKind::NoIncludeEnd => "</noinclude>",
        IncludeKind::OnlyIncludeStart => "<onlyinclude>",
        IncludeKind::OnlyIncludeEnd => "</onlyinclude>",
        IncludeKind::IncludeOnlyEnd => unreachable!(),
    };
    let src = dmw
        .and_then(|m| m.extra.get("src"))
        .and_then(|v| v.as_str())
        .or(dp.src.as_deref())
        .unwrap_or(default);
    write!(state, "{src}")?;
    Ok(())
}

/// The newline margin this handler requests before its output (spec §4.5's
/// "before/after spacing"). `categorydefaultsort` wants an extra blank line
/// after a wikitext (non-HTML) paragraph; any freshly inserted, non-placeholder
/// meta wants at least one.
pub fn before(node: &Handle, store: &DomDataStore, env: &dyn Env) -> usize {
    margin(node, store, env)
}

/// The newline margin this handler requests after its output. The contract
/// is symmetric (spec §4.5), so this shares [`margin`] with [`before`].
pub fn after(node: &Handle, store: &DomDataStore, env: &dyn Env) -> usize {
    margin(node, store, env)
}

fn margin(node: &Handle, store: &DomDataStore, env: &dyn Env) -> usize {
    if node.get_attr("property").as_deref() == Some("mw:PageProp/categorydefaultsort") {
        let prev_is_wikitext_p = node.previous_sibling().is_some_and(|sib| {
            sib.tag_name().as_deref() == Some("p") && store.data_parsoid(&sib, env).stx.as_deref() != Some("html")
        });
        return if prev_is_wikitext_p { 2 } else { 1 };
    }
    let is_placeholder = node.typeof_has_prefix(&["Placeholder"]);
    let is_inserted = store.has_diff_mark(node, env, crate::dom::store::DiffMark::Inserted);
    if is_inserted && !is_placeholder {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use crate::env::StaticEnv;
    use crate::parsoid_data::DataParsoid;

    #[test]
    fn test_placeholder_emits_preserved_source_verbatim() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("meta");
        node.set_attr("typeof", "mw:Placeholder");
        store.set_data_parsoid(
            &node,
            &env,
            DataParsoid {
                src: Some("[[X".to_owned()),
                ..Default::default()
            },
        );

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "[[X");
    }

    #[test]
    fn test_diff_marker_emits_nothing() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("meta");
        node.set_attr("typeof", "mw:DiffMarker/deleted");

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "");
    }

    #[test]
    fn test_include_only_end_emits_nothing_but_start_emits_default() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let start = Node::element("meta");
        start.set_attr("typeof", "mw:Includes/IncludeOnly");
        let mut state = SerializerState::new();
        handle(&start, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "<includeonly>");

        let end = Node::element("meta");
        end.set_attr("typeof", "mw:Includes/IncludeOnly/End");
        let mut state = SerializerState::new();
        handle(&end, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "");
    }

    #[test]
    fn test_magic_masq_with_expanded_attrs_uses_template_braces() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("meta");
        node.set_attr("property", "mw:PageProp/displaytitle");
        node.set_attr("typeof", "mw:ExpandedAttrs");
        node.set_attr("content", "DISPLAYTITLE:Foo");

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "{{DISPLAYTITLE:Foo}}");
    }

    #[test]
    fn test_plain_magic_word_uses_site_config_source() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("meta");
        node.set_attr("property", "mw:PageProp/notoc");

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "__NOTOC__");
    }

    #[test]
    fn test_categorydefaultsort_wants_two_newlines_after_wikitext_paragraph() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let body = Node::element("body");
        let p = Node::element("p");
        body.append_child(&p);
        let meta = Node::element("meta");
        meta.set_attr("property", "mw:PageProp/categorydefaultsort");
        body.append_child(&meta);

        assert_eq!(margin(&meta, &store, &env), 2);
    }

    #[test]
    fn test_unrelated_meta_has_zero_margin_by_default() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("meta");
        node.set_attr("typeof", "mw:Foo");
        assert_eq!(margin(&node, &store, &env), 0);
    }
}
