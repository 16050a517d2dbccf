//! State & Environment glue (C6, spec §4.5–§4.6, §9's "dynamic dispatch
//! across handlers" design note): the html2wt driver's chunk emitter and the
//! handler dispatch table the two serializer handlers (C5) plug into.
//!
//! The emitter is grounded in the teacher's `renderer::emitters::GrafEmitter`
//! (see `src/renderer/emitters.rs`): a small piece of state threaded through
//! the walk that knows how many newlines are still owed before the next
//! chunk, rather than every handler computing margins against raw string
//! contents itself.

pub mod lang_variant;
pub mod meta;

use core::fmt;

use crate::dom::store::DomDataStore;
use crate::dom::{Handle, NodeData};
use crate::env::Env;
use crate::error::Result;
use crate::frame::Frame;
use crate::span::Span;

/// Accumulates wikitext output and the newline budget owed between chunks.
///
/// Handlers never push raw `\n` padding themselves; they call
/// [`Self::request_min_newlines`] and let the state reconcile it against
/// what has already been written, the same "defer, then reconcile on the
/// next write" shape as `GrafEmitter::next`.
#[derive(Debug, Default)]
pub struct SerializerState {
    out: String,
}

impl SerializerState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures at least `min` newlines separate what has been written so far
    /// from the next chunk, padding if necessary. A no-op at the very start
    /// of output (there is nothing to separate from yet).
    pub fn request_min_newlines(&mut self, min: usize) {
        if min == 0 || self.out.is_empty() {
            return;
        }
        let have = self.out.chars().rev().take_while(|&c| c == '\n').count();
        if have < min {
            for _ in have..min {
                self.out.push('\n');
            }
        }
    }

    /// Consumes the state, returning the accumulated wikitext.
    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}

impl fmt::Write for SerializerState {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }
}

/// A handler's capability record (spec §9): the function that emits a
/// node's wikitext, plus the newline margins it requests on either side and
/// whether it forces start-of-line.
#[derive(Clone, Copy)]
pub struct Handler {
    /// Emits `node`'s wikitext into `state`. Takes the source `Frame`, if
    /// one is available, so a fallback (e.g. [`generic_handle`]) can keep
    /// recursing through [`serialize_node`] with selective serialization
    /// still in effect for its children.
    pub handle: fn(&Handle, &mut SerializerState, &DomDataStore, &dyn Env, Option<&Frame<'_>>) -> Result<()>,
    /// The minimum newlines this handler wants before its output.
    pub before: fn(&Handle, &DomDataStore, &dyn Env) -> usize,
    /// The minimum newlines this handler wants after its output.
    pub after: fn(&Handle, &DomDataStore, &dyn Env) -> usize,
    /// Whether this handler requires emission to start at the beginning of
    /// a line.
    pub force_sol: fn(&Handle) -> bool,
}

fn zero_margin(_: &Handle, _: &DomDataStore, _: &dyn Env) -> usize {
    0
}

fn never_force_sol(_: &Handle) -> bool {
    false
}

/// Looks up the handler for `node` (spec §9): by `data-mw-variant` presence
/// first (the language-variant handler applies regardless of tag name), then
/// by tag name (currently only `<meta>` has a dedicated handler), falling
/// through to [`generic_handler`] for everything else.
#[must_use]
pub fn dispatch(node: &Handle) -> Handler {
    if node.get_attr("data-mw-variant").is_some() {
        return Handler {
            handle: lang_variant::handle,
            before: zero_margin,
            after: zero_margin,
            force_sol: never_force_sol,
        };
    }
    if node.tag_name().as_deref() == Some("meta") {
        return Handler {
            handle: meta::handle,
            before: meta::before,
            after: meta::after,
            force_sol: never_force_sol,
        };
    }
    generic_handler()
}

/// The fallback handler (spec §4.5 step 5's "delegate to the fallback HTML
/// handler"): re-emits the element as literal HTML, recursing into its
/// children through [`serialize_node`]. Wikitext tolerates embedded raw
/// HTML, so this is a faithful (if verbose) round trip for any construct
/// the core does not model a dedicated wikitext shape for.
#[must_use]
pub fn generic_handler() -> Handler {
    Handler {
        handle: generic_handle,
        before: zero_margin,
        after: zero_margin,
        force_sol: never_force_sol,
    }
}

fn generic_handle(
    node: &Handle,
    state: &mut SerializerState,
    store: &DomDataStore,
    env: &dyn Env,
    frame: Option<&Frame<'_>>,
) -> Result<()> {
    use fmt::Write as _;

    let Some(name) = node.tag_name() else {
        return Ok(());
    };
    write!(state, "<{name}")?;
    for (key, value) in node.attrs().unwrap_or_default() {
        write!(state, " {key}=\"{}\"", html_escape::encode_double_quoted_attribute(&value))?;
    }
    let children = node.children();
    if children.is_empty() && crate::serializer::void_element(&name) {
        write!(state, "/>")?;
        return Ok(());
    }
    write!(state, ">")?;
    for child in &children {
        serialize_node(child, state, store, env, frame)?;
    }
    write!(state, "</{name}>")?;
    Ok(())
}

/// Returns the verbatim source slice for `node`, if selective serialization
/// applies: a `Frame` is available, `node` carries no diff mark of any kind
/// (spec §8's "round-trip of unmodified subtree" law), and its
/// `data-parsoid.dsr` is known. This is checked once per node, before
/// dispatch, so an unmodified descendant still round-trips verbatim even
/// when an ancestor needed full reconstruction (spec §1's "preserving
/// original source for unmodified subtrees").
fn verbatim_source<'a>(node: &Handle, store: &DomDataStore, env: &dyn Env, frame: Option<&Frame<'a>>) -> Option<&'a str> {
    let frame = frame?;
    if !store.diff_marks(node, env).is_empty() {
        return None;
    }
    let (start, end, _, _) = store.data_parsoid(node, env).dsr?;
    frame.text_at(Span::new(start, end))
}

/// Walks `node` and its subtree, dispatching each element to its handler
/// (spec §9) and reconciling newline margins between siblings. When `frame`
/// is supplied, an unmodified subtree with a known `dsr` is copied verbatim
/// from the source instead of being reconstructed handler-by-handler (spec
/// §8's selective-serialization law; see [`verbatim_source`]).
pub fn serialize_node(
    node: &Handle,
    state: &mut SerializerState,
    store: &DomDataStore,
    env: &dyn Env,
    frame: Option<&Frame<'_>>,
) -> Result<()> {
    use fmt::Write as _;

    match &node.data {
        NodeData::Document => {
            for child in node.children() {
                serialize_node(&child, state, store, env, frame)?;
            }
            return Ok(());
        }
        NodeData::Text(text) => {
            write!(state, "{}", text.borrow())?;
            return Ok(());
        }
        NodeData::Comment(text) => {
            write!(state, "<!--{}-->", text.borrow())?;
            return Ok(());
        }
        NodeData::Element(_) => {}
    }

    if let Some(src) = verbatim_source(node, store, env, frame) {
        write!(state, "{src}")?;
        return Ok(());
    }

    let handler = dispatch(node);
    state.request_min_newlines((handler.before)(node, store, env));
    (handler.handle)(node, state, store, env, frame)?;
    state.request_min_newlines((handler.after)(node, store, env));
    Ok(())
}


#[cfg(test)]
mod doc_tests {
    use super::*;
    use crate::dom::Node;
    use crate::env::StaticEnv;

    #[test]
    fn test_serialize_document_walks_every_top_level_child() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let doc = Node::document();
        doc.append_child(&Node::text("a"));
        doc.append_child(&Node::text("b"));

        let mut state = SerializerState::new();
        serialize_node(&doc, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "ab");
    }
}
