//! The DOM Diff (C3, spec §4.3): structural/attribute diffing between a
//! pre-edit and a post-edit DOM, driving selective serialization.
//!
//! The algorithm is a textbook greedy LCS child diff, grounded in the same
//! "identity key, then positional fallback" pairing strategy spec §4.3 lays
//! out; there is no teacher precedent for a tree differ specifically (the
//! teacher is a renderer, not an editor), so this follows the algorithm
//! section of the spec directly while keeping the crate's established
//! `Env`/`DomDataStore` collaborator shapes.

use crate::dom::store::{DiffMark, DomDataStore};
use crate::dom::{Handle, Node, NodeData};
use crate::env::Env;

/// Computes a diff between `old_root` and `new_root`, annotating `new_root`
/// via `store` (spec §4.3). Returns `true` if any mark beyond a completely
/// clean match was recorded.
pub fn diff(old_root: &Handle, new_root: &Handle, store: &DomDataStore, env: &dyn Env) -> bool {
    diff_node(old_root, new_root, store, env)
}

fn identity_key(node: &Handle) -> Option<String> {
    node.about()
}

fn is_opaque_wrapper(node: &Handle, store: &DomDataStore, env: &dyn Env) -> bool {
    store.has_diff_mark(node, env, DiffMark::ModifiedWrapper)
}

/// Diffs a single paired (old, new) node, returning true if `new` or any
/// descendant was marked.
fn diff_node(old: &Handle, new: &Handle, store: &DomDataStore, env: &dyn Env) -> bool {
    match (&old.data, &new.data) {
        (NodeData::Text(old_text), NodeData::Text(new_text)) => {
            *old_text.borrow() != *new_text.borrow()
        }
        (NodeData::Element(_), NodeData::Element(_)) => diff_elements(old, new, store, env),
        _ => false,
    }
}

fn diff_elements(old: &Handle, new: &Handle, store: &DomDataStore, env: &dyn Env) -> bool {
    let attrs_differ = old.attrs() != new.attrs();
    if attrs_differ {
        // Spec §8 scenario 3: any paired element whose own attributes
        // differ is `modified-wrapper`, whether or not it is itself an
        // encapsulation wrapper. No descendant changed, so this alone
        // never implies `subtree-changed`.
        store.add_diff_mark(new, env, DiffMark::ModifiedWrapper);
    }

    let looks_like_wrapper = new
        .get_attr("typeof")
        .is_some_and(|t| t.split_ascii_whitespace().any(|tok| tok.starts_with("mw:")));

    if attrs_differ && looks_like_wrapper {
        // Spec §4.3 step 2: attribute-changed encapsulation wrapper is
        // opaque. Do not recurse; its content is not diffed at all.
        return true;
    }

    let children_changed = diff_children(old, new, store, env);
    if children_changed {
        store.add_diff_mark(new, env, DiffMark::SubtreeChanged);
    }
    attrs_differ || children_changed
}

/// Diffs `old`'s and `new`'s children by greedy LCS over `(tag, identity)`
/// tuples (spec §4.3 step 3), inserting synthetic
/// `mw:DiffMarker/deleted` metas for unmatched old children.
fn diff_children(old: &Handle, new: &Handle, store: &DomDataStore, env: &dyn Env) -> bool {
    let old_children = group_about_units(old.children());
    let new_children = group_about_units(new.children());

    let matching = lcs_match(&old_children, &new_children);

    let mut any_insert = false;
    let mut any_delete = false;
    let mut any_subtree_change = false;

    let mut old_matched = vec![false; old_children.len()];
    let mut new_matched = vec![false; new_children.len()];
    for &(oi, ni) in &matching {
        old_matched[oi] = true;
        new_matched[ni] = true;
        let old_unit = &old_children[oi];
        let new_unit = &new_children[ni];
        let unit_changed = diff_unit(old_unit, new_unit, store, env);
        if unit_changed {
            any_subtree_change = true;
        }
    }

    for (ni, unit) in new_children.iter().enumerate() {
        if !new_matched[ni] {
            any_insert = true;
            for node in unit {
                store.add_diff_mark(node, env, DiffMark::Inserted);
            }
        }
    }

    // Unmatched old children: insert a synthetic deletion marker into `new`
    // at the position the old unit occupied, anchored just after the
    // nearest preceding matched new unit (spec §4.3 step 3).
    let mut insertion_anchor = 0usize;
    for (oi, unit) in old_children.iter().enumerate() {
        if old_matched[oi] {
            if let Some(&(_, ni)) = matching.iter().find(|&&(o, _)| o == oi) {
                insertion_anchor = new_unit_end_child_index(&new_children, ni);
            }
            continue;
        }
        any_delete = true;
        let marker = Node::element("meta");
        marker.set_attr("typeof", "mw:DiffMarker/deleted");
        let _ = unit; // old content itself is not retained; only its position matters
        new.insert_child(insertion_anchor.min(new.child_count()), &marker);
        insertion_anchor += 1;
    }

    let children_changed = any_insert || any_delete;
    if children_changed {
        store.add_diff_mark(new, env, DiffMark::ChildrenChanged);
    }
    children_changed || any_subtree_change
}

fn new_unit_end_child_index(new_children: &[Vec<Handle>], unit_index: usize) -> usize {
    new_children[..=unit_index].iter().map(Vec::len).sum()
}

/// Diffs one matched (old, new) about-sibling unit. A unit of length 1 is
/// just a lone element or text node; longer units are encapsulation groups,
/// diffed as a whole (spec §4.3 step 5) — if the first member is an opaque
/// wrapper, the rest of the group is not inspected.
fn diff_unit(old_unit: &[Handle], new_unit: &[Handle], store: &DomDataStore, env: &dyn Env) -> bool {
    let Some(old_first) = old_unit.first() else { return false };
    let Some(new_first) = new_unit.first() else { return false };
    let changed = diff_node(old_first, new_first, store, env);
    if is_opaque_wrapper(new_first, store, env) {
        return changed;
    }
    changed
}

/// Groups a child list into encapsulation units: a run of consecutive
/// `about`-sharing siblings collapses into one unit (spec §4.3 step 5); any
/// other child is its own unit of length 1. Delegates to
/// [`Node::about_siblings`] (SPEC_FULL §B) rather than re-deriving the same
/// grouping ad hoc.
fn group_about_units(children: Vec<Handle>) -> Vec<Vec<Handle>> {
    let mut units = Vec::new();
    let mut i = 0;
    while i < children.len() {
        let group = children[i].about_siblings();
        i += group.len();
        units.push(group);
    }
    units
}

fn unit_key(unit: &[Handle]) -> (Option<String>, Option<String>, Option<String>) {
    let Some(first) = unit.first() else {
        return (None, None, None);
    };
    let tag = first.tag_name();
    let identity = identity_key(first);
    let text = match &first.data {
        NodeData::Text(t) => Some(t.borrow().clone()),
        _ => None,
    };
    (tag, identity, text)
}

/// Greedy LCS over `(tag, identity-or-text)` tuples (spec §4.3 step 3):
/// returns the list of matched `(old_index, new_index)` pairs, in order.
fn lcs_match(old: &[Vec<Handle>], new: &[Vec<Handle>]) -> Vec<(usize, usize)> {
    let old_keys: Vec<_> = old.iter().map(unit_key).collect();
    let new_keys: Vec<_> = new.iter().map(unit_key).collect();

    let n = old_keys.len();
    let m = new_keys.len();
    let mut table = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if old_keys[i] == new_keys[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old_keys[i] == new_keys[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnv;

    fn p(text: &str) -> Handle {
        let p = Node::element("p");
        p.append_child(&Node::text(text));
        p
    }

    #[test]
    fn test_text_change_in_first_paragraph() {
        let old_root = Node::element("body");
        old_root.append_child(&p("a"));
        old_root.append_child(&p("b"));

        let new_root = Node::element("body");
        new_root.append_child(&p("A"));
        new_root.append_child(&p("b"));

        let store = DomDataStore::new();
        let env = StaticEnv::new();
        diff(&old_root, &new_root, &store, &env);

        let new_children = new_root.children();
        let first = &new_children[0];
        assert!(store.has_diff_mark(first, &env, DiffMark::ChildrenChanged));
        assert!(store.has_diff_mark(first, &env, DiffMark::SubtreeChanged));
        assert!(store.diff_marks(&new_children[1], &env).is_empty());
        assert_eq!(first.child_count(), 2);
        assert!(
            first
                .children()
                .iter()
                .any(|c| c.get_attr("typeof").as_deref() == Some("mw:DiffMarker/deleted"))
        );
    }

    #[test]
    fn test_delete_trailing_paragraph() {
        let old_root = Node::element("body");
        old_root.append_child(&p("a"));
        old_root.append_child(&p("b"));

        let new_root = Node::element("body");
        new_root.append_child(&p("a"));

        let store = DomDataStore::new();
        let env = StaticEnv::new();
        diff(&old_root, &new_root, &store, &env);

        assert!(store.has_diff_mark(&new_root, &env, DiffMark::ChildrenChanged));
        let children = new_root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[1].get_attr("typeof").as_deref(),
            Some("mw:DiffMarker/deleted")
        );
    }

    #[test]
    fn test_attribute_change_marks_wrapper_only() {
        let old_root = Node::element("body");
        let old_a = Node::element("p");
        old_a.set_attr("class", "a");
        old_a.append_child(&Node::text("a"));
        old_root.append_child(&old_a);
        let old_b = Node::element("p");
        old_b.set_attr("class", "b");
        old_b.append_child(&Node::text("b"));
        old_root.append_child(&old_b);

        let new_root = Node::element("body");
        let new_a = Node::element("p");
        new_a.set_attr("class", "X");
        new_a.append_child(&Node::text("a"));
        new_root.append_child(&new_a);
        let new_b = Node::element("p");
        new_b.set_attr("class", "b");
        new_b.append_child(&Node::text("b"));
        new_root.append_child(&new_b);

        let store = DomDataStore::new();
        let env = StaticEnv::new();
        diff(&old_root, &new_root, &store, &env);

        assert!(store.has_diff_mark(&new_a, &env, DiffMark::ModifiedWrapper));
        assert!(!store.has_diff_mark(&new_a, &env, DiffMark::SubtreeChanged));
        assert!(store.diff_marks(&new_a.children()[0], &env).is_empty());
        assert!(store.diff_marks(&new_b, &env).is_empty());
    }
}
