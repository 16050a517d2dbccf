//! The XML/HTML5 Serializer (C1, spec §4.1): emits XHTML-compatible bytes
//! from a DOM, the way wt2html's final step does.
//!
//! Grounded in the html5ever-lineage serializer's stack-walking shape (see
//! `other_examples/…src-serialize-mod.rs.rs`): a small per-element record
//! tracking whether this element ignores children (void) and whether its
//! first child has been written yet (for the newline-stripping rule), pushed
//! and popped as the tree is walked.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::dom::{Handle, NodeData};

/// The fixed void-element set (spec §4.1): emitted self-closed, and any
/// children they do carry are still emitted (a tolerated degenerate case).
static VOID_ELEMENTS: phf::Set<&'static str> = phf::phf_set! {
    "area", "base", "basefont", "bgsound", "br", "col", "command", "embed",
    "frame", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
};

/// Elements whose single text child is emitted verbatim, with no entity
/// escaping (spec §4.1).
static RAW_CONTENT_ELEMENTS: phf::Set<&'static str> = phf::phf_set! {
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
    "noscript",
};

/// Elements whose leading `\n` text child needs an extra `\n` on emission to
/// survive a re-parse (spec §4.1, the newline-preservation law in §8).
static NEWLINE_STRIPPING_ELEMENTS: phf::Set<&'static str> = phf::phf_set! {
    "pre", "textarea", "listing",
};

/// Options controlling [`serialize`] (spec §4.1).
#[derive(Clone, Copy, Debug)]
pub struct SerializeOptions {
    /// Choose the attribute-value quote style that minimizes escaping.
    pub smart_quote: bool,
    /// Serialize only `node`'s children, never `node` itself or a DOCTYPE.
    pub inner_xml: bool,
    /// Record per-`id` byte offsets of `<body>`'s direct children.
    pub capture_offsets: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            smart_quote: true,
            inner_xml: false,
            capture_offsets: false,
        }
    }
}

/// The result of [`serialize`].
#[derive(Clone, Debug, Default)]
pub struct SerializeResult {
    /// The serialized bytes, as a UTF-8 string.
    pub html: String,
    /// Byte ranges (in UTF-8 code units, relative to the end of `<body>`'s
    /// opening tag) of every body child that carries an `id` attribute, or
    /// whose encapsulation group's first member does (spec §4.1).
    pub offsets: Option<HashMap<String, (usize, usize)>>,
}

/// Returns true if `name` is in the fixed void-element set (spec §4.1).
/// Exposed for [`crate::html2wt`]'s generic fallback handler, which emits
/// literal HTML and needs the same self-closing rule C1 uses.
#[must_use]
pub fn void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(name)
}

/// Serializes `node` per spec §4.1.
#[must_use]
pub fn serialize(node: &Handle, options: &SerializeOptions) -> SerializeResult {
    let mut out = String::new();
    if !options.inner_xml && node.tag_name().as_deref() == Some("html") {
        out.push_str("<!DOCTYPE html>\n");
    }

    let offsets = if options.capture_offsets {
        Some(capture_body_offsets(node, options))
    } else {
        None
    };

    if options.inner_xml {
        for child in node.children() {
            write_node(&child, &mut out, options, true);
        }
    } else {
        write_node(node, &mut out, options, true);
    }

    SerializeResult { html: out, offsets }
}

fn capture_body_offsets(
    root: &Handle,
    options: &SerializeOptions,
) -> HashMap<String, (usize, usize)> {
    let mut offsets = HashMap::new();
    let Some(body) = find_descendant_by_tag(root, "body") else {
        return offsets;
    };

    let mut pos = 0usize;
    let children = body.children();
    let mut i = 0;
    while i < children.len() {
        let group_about = children[i].about();
        let mut group_end = i + 1;
        if group_about.is_some() {
            while group_end < children.len() && children[group_end].about() == group_about {
                group_end += 1;
            }
        }

        let group = &children[i..group_end];
        let start = pos;
        let mut id_key = None;
        for member in group {
            let mut buf = String::new();
            write_node(member, &mut buf, options, true);
            if id_key.is_none() {
                id_key = member.get_attr("id");
            }
            pos += buf.len();
        }
        if let Some(id) = id_key {
            offsets.insert(id, (start, pos));
        }
        i = group_end;
    }
    offsets
}

fn find_descendant_by_tag(node: &Handle, tag: &str) -> Option<Handle> {
    if node.tag_name().as_deref() == Some(tag) {
        return Some(node.clone());
    }
    for child in node.children() {
        if let Some(found) = find_descendant_by_tag(&child, tag) {
            return Some(found);
        }
    }
    None
}

fn write_node(node: &Handle, out: &mut String, options: &SerializeOptions, is_first_child: bool) {
    match &node.data {
        NodeData::Document => {
            for child in node.children() {
                write_node(&child, out, options, true);
            }
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(&text.borrow());
            out.push_str("-->");
        }
        NodeData::Text(text) => {
            write_text(out, &text.borrow(), node, is_first_child);
        }
        NodeData::Element(_) => write_element(node, out, options),
    }
}

fn write_text(out: &mut String, text: &str, node: &Handle, is_first_child: bool) {
    let parent_tag = node.parent().and_then(|p| p.tag_name());
    let prepend_lf = is_first_child
        && text.starts_with('\n')
        && parent_tag
            .as_deref()
            .is_some_and(|t| NEWLINE_STRIPPING_ELEMENTS.contains(t));
    if prepend_lf {
        out.push('\n');
    }

    let escape = match parent_tag.as_deref() {
        Some(t) => !RAW_CONTENT_ELEMENTS.contains(t),
        None => true,
    };
    if escape {
        write_escaped_text(out, text);
    } else {
        out.push_str(text);
    }
}

fn write_escaped_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            c => out.push(c),
        }
    }
}

fn write_element(node: &Handle, out: &mut String, options: &SerializeOptions) {
    let Some(name) = node.tag_name() else { return };
    let is_void = VOID_ELEMENTS.contains(name.as_str());

    out.push('<');
    out.push_str(&name);
    for (key, value) in node.attrs().unwrap_or_default() {
        out.push(' ');
        out.push_str(&key);
        out.push('=');
        write_attr_value(out, &value, options.smart_quote);
    }

    let children = node.children();
    if is_void && children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    for (i, child) in children.iter().enumerate() {
        write_node(child, out, options, i == 0);
    }

    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn write_attr_value(out: &mut String, value: &str, smart_quote: bool) {
    let double_count = value.matches('"').count();
    let single_count = value.matches('\'').count();
    let use_single = smart_quote && double_count > single_count;
    let quote = if use_single { '\'' } else { '"' };

    out.push(quote);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            c if c == quote => {
                let _ = write!(out, "&#{};", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;

    #[test]
    fn test_void_element_self_closes() {
        let node = Node::element("br");
        let result = serialize(&node, &SerializeOptions::default());
        assert_eq!(result.html, "<br/>");
    }

    #[test]
    fn test_void_element_with_children_emits_them() {
        let node = Node::element("br");
        node.append_child(&Node::text("oops"));
        let result = serialize(&node, &SerializeOptions::default());
        assert_eq!(result.html, "<br>oops</br>");
    }

    #[test]
    fn test_text_escaping() {
        let node = Node::element("p");
        node.append_child(&Node::text("a < b & c"));
        let result = serialize(&node, &SerializeOptions::default());
        assert_eq!(result.html, "<p>a &lt; b &amp; c</p>");
    }

    #[test]
    fn test_raw_content_not_escaped() {
        let node = Node::element("script");
        node.append_child(&Node::text("a < b && c"));
        let result = serialize(&node, &SerializeOptions::default());
        assert_eq!(result.html, "<script>a < b && c</script>");
    }

    #[test]
    fn test_newline_stripping_element_preserves_leading_newline() {
        let node = Node::element("pre");
        node.append_child(&Node::text("\nfoo"));
        let result = serialize(&node, &SerializeOptions::default());
        assert_eq!(result.html, "<pre>\n\nfoo</pre>");
    }

    #[test]
    fn test_smart_quote_prefers_single_when_fewer_escapes() {
        let node = Node::element("span");
        node.set_attr("title", "has \"double\" quotes");
        let result = serialize(&node, &SerializeOptions::default());
        assert!(result.html.contains("title='has \"double\" quotes'"));
    }

    #[test]
    fn test_smart_quote_disabled_always_uses_double() {
        let node = Node::element("span");
        node.set_attr("title", "has \"double\" quotes");
        let opts = SerializeOptions {
            smart_quote: false,
            ..Default::default()
        };
        let result = serialize(&node, &opts);
        assert!(result.html.starts_with("<span title=\""));
        assert!(result.html.contains("&#34;"));
    }

    #[test]
    fn test_doctype_prepended_for_html_root() {
        let node = Node::element("html");
        let result = serialize(&node, &SerializeOptions::default());
        assert!(result.html.starts_with("<!DOCTYPE html>\n<html>"));
    }

    #[test]
    fn test_inner_xml_skips_doctype_and_self() {
        let node = Node::element("html");
        node.append_child(&Node::element("body"));
        let opts = SerializeOptions {
            inner_xml: true,
            ..Default::default()
        };
        let result = serialize(&node, &opts);
        assert_eq!(result.html, "<body></body>");
    }

    #[test]
    fn test_capture_offsets_keys_by_id() {
        let html = Node::element("html");
        let body = Node::element("body");
        let p = Node::element("p");
        p.set_attr("id", "mwAQ");
        p.append_child(&Node::text("hi"));
        body.append_child(&p);
        html.append_child(&body);

        let opts = SerializeOptions {
            capture_offsets: true,
            ..Default::default()
        };
        let result = serialize(&html, &opts);
        let offsets = result.offsets.unwrap();
        assert_eq!(offsets.get("mwAQ"), Some(&(0, "<p id=\"mwAQ\">hi</p>".chars().count())));
    }

    #[test]
    fn test_capture_offsets_propagates_group_id_across_about_siblings() {
        let html = Node::element("html");
        let body = Node::element("body");
        let a = Node::element("span");
        a.set_attr("id", "mwAQ");
        a.set_attr("about", "#mwt1");
        let b = Node::element("span");
        b.set_attr("about", "#mwt1");
        body.append_child(&a);
        body.append_child(&b);
        html.append_child(&body);

        let opts = SerializeOptions {
            capture_offsets: true,
            ..Default::default()
        };
        let result = serialize(&html, &opts);
        let offsets = result.offsets.unwrap();
        assert_eq!(offsets.len(), 1);
        assert!(offsets.contains_key("mwAQ"));
    }

    #[test]
    fn test_capture_offsets_counts_utf8_code_units_not_chars() {
        let html = Node::element("html");
        let body = Node::element("body");
        let lead = Node::element("p");
        lead.set_attr("id", "mw0");
        lead.append_child(&Node::text("café"));
        let p = Node::element("p");
        p.set_attr("id", "mwAQ");
        p.append_child(&Node::text("hi"));
        body.append_child(&lead);
        body.append_child(&p);
        html.append_child(&body);

        let opts = SerializeOptions {
            capture_offsets: true,
            ..Default::default()
        };
        let result = serialize(&html, &opts);
        let offsets = result.offsets.unwrap();
        let lead_html = "<p id=\"mw0\">caf\u{e9}</p>";
        assert_eq!(lead_html.chars().count(), lead_html.len() - 1);
        assert_eq!(offsets.get("mw0"), Some(&(0, lead_html.len())));
        assert_eq!(
            offsets.get("mwAQ"),
            Some(&(lead_html.len(), lead_html.len() + "<p id=\"mwAQ\">hi</p>".len()))
        );
    }
}
