//! The DOM external collaborator (spec §6): a minimal, owned tree type that
//! the (external) tree builder would hand this crate, and that the
//! serializer, differ and attribute expander all walk.
//!
//! Shaped after the `markup5ever_rcdom`/`html5ever` reference-counted DOM
//! (see `other_examples/…markup5ever-rcdom.rs`): a [`Handle`] is an `Rc<Node>`
//! with a `Weak` parent pointer, so a subtree can be detached and re-attached
//! without copying. This crate does not implement a tree builder (spec §1);
//! callers construct a tree directly via [`Node::element`]/[`Node::text`] and
//! [`Node::append_child`], the way a fixture or a test builds one.

pub mod store;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::env::Env;

/// A strong reference to a DOM node.
pub type Handle = Rc<Node>;

/// A weak reference to a DOM node, used for parent pointers so the tree has
/// no reference cycles.
pub type WeakHandle = Weak<Node>;

/// A DOM node: a document, an element, a text run, or a comment.
pub struct Node {
    id: Cell<Option<u64>>,
    parent: RefCell<Option<WeakHandle>>,
    children: RefCell<Vec<Handle>>,
    /// The node's kind-specific payload.
    pub data: NodeData,
}

/// A node's kind-specific payload.
pub enum NodeData {
    /// The document root. Holds no data of its own; its children are the
    /// top-level nodes.
    Document,
    /// An element, with a tag name and an ordered attribute list.
    Element(ElementData),
    /// A run of text.
    Text(RefCell<String>),
    /// An HTML comment.
    Comment(RefCell<String>),
}

/// An element's tag name and attributes.
pub struct ElementData {
    name: RefCell<String>,
    attrs: RefCell<Vec<(String, String)>>,
}

impl Node {
    fn new(data: NodeData) -> Handle {
        Rc::new(Node {
            id: Cell::new(None),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            data,
        })
    }

    /// Creates a new, parentless document node.
    #[must_use]
    pub fn document() -> Handle {
        Node::new(NodeData::Document)
    }

    /// Creates a new, parentless element node.
    #[must_use]
    pub fn element(name: impl Into<String>) -> Handle {
        Node::new(NodeData::Element(ElementData {
            name: RefCell::new(name.into()),
            attrs: RefCell::new(Vec::new()),
        }))
    }

    /// Creates a new, parentless text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Handle {
        Node::new(NodeData::Text(RefCell::new(text.into())))
    }

    /// Creates a new, parentless comment node.
    #[must_use]
    pub fn comment(text: impl Into<String>) -> Handle {
        Node::new(NodeData::Comment(RefCell::new(text.into())))
    }

    /// Returns this node's process-unique id, assigning one from `env` on
    /// first access. Backs the indirection the DOM data store keys on (spec
    /// §4.2, §6).
    pub fn ensure_id(self: &Rc<Self>, env: &dyn Env) -> u64 {
        if let Some(id) = self.id.get() {
            return id;
        }
        let id = env.new_node_id();
        self.id.set(Some(id));
        id
    }

    /// Returns this node's id, if one has already been assigned.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id.get()
    }

    /// Returns true if this node is an element.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Returns this node's tag name, lowercased, if it is an element.
    #[must_use]
    pub fn tag_name(&self) -> Option<String> {
        match &self.data {
            NodeData::Element(e) => Some(e.name.borrow().clone()),
            _ => None,
        }
    }

    /// Returns this node's attribute list, in source order, if it is an
    /// element.
    #[must_use]
    pub fn attrs(&self) -> Option<Vec<(String, String)>> {
        match &self.data {
            NodeData::Element(e) => Some(e.attrs.borrow().clone()),
            _ => None,
        }
    }

    /// Looks up an attribute's value by name, if this is an element.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<String> {
        match &self.data {
            NodeData::Element(e) => e
                .attrs
                .borrow()
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Sets an attribute, appending it if not already present, if this is an
    /// element. A no-op on other node kinds.
    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<String>) {
        let NodeData::Element(e) = &self.data else { return };
        let name = name.into();
        let value = value.into();
        let mut attrs = e.attrs.borrow_mut();
        if let Some(slot) = attrs.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            attrs.push((name, value));
        }
    }

    /// Removes an attribute, returning its former value, if this is an
    /// element.
    pub fn remove_attr(&self, name: &str) -> Option<String> {
        let NodeData::Element(e) = &self.data else { return None };
        let mut attrs = e.attrs.borrow_mut();
        let idx = attrs.iter().position(|(k, _)| k == name)?;
        Some(attrs.remove(idx).1)
    }

    /// Returns the node's text content, if it is a text or comment node.
    #[must_use]
    pub fn text_content(&self) -> Option<String> {
        match &self.data {
            NodeData::Text(t) | NodeData::Comment(t) => Some(t.borrow().clone()),
            _ => None,
        }
    }

    /// Overwrites the node's text content, if it is a text or comment node.
    pub fn set_text_content(&self, text: impl Into<String>) {
        match &self.data {
            NodeData::Text(t) | NodeData::Comment(t) => *t.borrow_mut() = text.into(),
            _ => {}
        }
    }

    /// Returns this node's current children, in document order.
    #[must_use]
    pub fn children(&self) -> Vec<Handle> {
        self.children.borrow().clone()
    }

    /// Returns the number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// Returns this node's parent, if attached to a tree.
    #[must_use]
    pub fn parent(&self) -> Option<Handle> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Detaches this node from its current parent, if any. A no-op if the
    /// node is already a root.
    pub fn detach(self: &Rc<Self>) {
        let Some(parent) = self.parent() else { return };
        parent
            .children
            .borrow_mut()
            .retain(|c| !Rc::ptr_eq(c, self));
        *self.parent.borrow_mut() = None;
    }

    /// Appends `child` to this node's children, detaching it from any
    /// previous parent first.
    pub fn append_child(self: &Rc<Self>, child: &Handle) {
        child.detach();
        *child.parent.borrow_mut() = Some(Rc::downgrade(self));
        self.children.borrow_mut().push(Rc::clone(child));
    }

    /// Inserts `child` at `index` among this node's children, detaching it
    /// from any previous parent first.
    pub fn insert_child(self: &Rc<Self>, index: usize, child: &Handle) {
        child.detach();
        *child.parent.borrow_mut() = Some(Rc::downgrade(self));
        self.children.borrow_mut().insert(index, Rc::clone(child));
    }

    /// Replaces this node's children wholesale with `children`, detaching
    /// whichever nodes they were previously attached to.
    pub fn set_children(self: &Rc<Self>, children: Vec<Handle>) {
        for old in self.children.borrow().iter() {
            *old.parent.borrow_mut() = None;
        }
        self.children.borrow_mut().clear();
        for child in children {
            self.append_child(&child);
        }
    }

    /// Returns this node's index among its parent's children, if attached.
    #[must_use]
    pub fn index_in_parent(self: &Rc<Self>) -> Option<usize> {
        let parent = self.parent()?;
        parent
            .children
            .borrow()
            .iter()
            .position(|c| Rc::ptr_eq(c, self))
    }

    /// Returns the next sibling, if any.
    #[must_use]
    pub fn next_sibling(self: &Rc<Self>) -> Option<Handle> {
        let parent = self.parent()?;
        let idx = self.index_in_parent()?;
        parent.children.borrow().get(idx + 1).cloned()
    }

    /// Returns the previous sibling, if any.
    #[must_use]
    pub fn previous_sibling(self: &Rc<Self>) -> Option<Handle> {
        let parent = self.parent()?;
        let idx = self.index_in_parent()?;
        idx.checked_sub(1)
            .and_then(|i| parent.children.borrow().get(i).cloned())
    }

    /// Returns this node's `about` attribute, if it is an element that
    /// carries one.
    #[must_use]
    pub fn about(&self) -> Option<String> {
        self.get_attr("about")
    }

    /// Returns the run of consecutive siblings (starting at, and including,
    /// `self`) that share `self`'s `about` id: an encapsulation group (spec
    /// §3.3, SPEC_FULL §B). Returns just `self` if it has no `about`
    /// attribute.
    #[must_use]
    pub fn about_siblings(self: &Rc<Self>) -> Vec<Handle> {
        let Some(about) = self.about() else {
            return vec![Rc::clone(self)];
        };
        let mut group = vec![Rc::clone(self)];
        let mut cursor = self.next_sibling();
        while let Some(node) = cursor {
            if node.about().as_deref() != Some(about.as_str()) {
                break;
            }
            cursor = node.next_sibling();
            group.push(node);
        }
        group
    }

    /// Returns true if this element's `typeof` attribute contains a token
    /// prefixed `mw:` whose remainder starts with one of `prefixes`.
    #[must_use]
    pub fn typeof_has_prefix(&self, prefixes: &[&str]) -> bool {
        let Some(typeof_) = self.get_attr("typeof") else { return false };
        typeof_.split_ascii_whitespace().any(|t| {
            t.strip_prefix("mw:")
                .is_some_and(|rest| prefixes.iter().any(|p| rest.starts_with(p)))
        })
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            NodeData::Document => write!(f, "#document"),
            NodeData::Element(e) => write!(f, "<{}>", e.name.borrow()),
            NodeData::Text(t) => write!(f, "{:?}", t.borrow()),
            NodeData::Comment(t) => write!(f, "<!--{}-->", t.borrow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnv;

    #[test]
    fn test_append_and_detach() {
        let parent = Node::element("p");
        let child = Node::text("hi");
        parent.append_child(&child);
        assert_eq!(parent.child_count(), 1);
        assert!(child.parent().is_some());
        child.detach();
        assert_eq!(parent.child_count(), 0);
        assert!(child.parent().is_none());
    }

    #[test]
    fn test_append_moves_between_parents() {
        let a = Node::element("div");
        let b = Node::element("div");
        let child = Node::element("span");
        a.append_child(&child);
        b.append_child(&child);
        assert_eq!(a.child_count(), 0);
        assert_eq!(b.child_count(), 1);
    }

    #[test]
    fn test_siblings() {
        let parent = Node::element("p");
        let a = Node::text("a");
        let b = Node::text("b");
        parent.append_child(&a);
        parent.append_child(&b);
        assert!(Rc::ptr_eq(&a.next_sibling().unwrap(), &b));
        assert!(Rc::ptr_eq(&b.previous_sibling().unwrap(), &a));
        assert!(a.previous_sibling().is_none());
    }

    #[test]
    fn test_ensure_id_stable() {
        let env = StaticEnv::new();
        let node = Node::element("span");
        let id1 = node.ensure_id(&env);
        let id2 = node.ensure_id(&env);
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_about_siblings_groups_consecutive_run() {
        let parent = Node::element("body");
        let a = Node::element("span");
        a.set_attr("about", "#mwt1");
        let b = Node::element("span");
        b.set_attr("about", "#mwt1");
        let unrelated = Node::element("span");
        parent.append_child(&a);
        parent.append_child(&b);
        parent.append_child(&unrelated);
        let group = a.about_siblings();
        assert_eq!(group.len(), 2);
        assert!(Rc::ptr_eq(&group[0], &a));
        assert!(Rc::ptr_eq(&group[1], &b));
        assert_eq!(unrelated.about_siblings().len(), 1);
    }

    #[test]
    fn test_typeof_has_prefix() {
        let meta = Node::element("meta");
        meta.set_attr("typeof", "mw:Placeholder/Fragment");
        assert!(meta.typeof_has_prefix(&["Placeholder", "Transclusion"]));
        assert!(!meta.typeof_has_prefix(&["Transclusion"]));
    }
}
