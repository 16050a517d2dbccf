//! The token data model (spec §3.1–§3.2): the shape the attribute expander
//! (C4) consumes and emits.
//!
//! A `tag` here always has an ordered attribute list attached, matching the
//! teacher's own `wikitext::Token::StartTag` shape. `SelfclosingTagTk` from
//! the GLOSSARY is modeled as `TagToken::self_closing = true` rather than a
//! fourth enum variant, since start tags and void tags differ only in that
//! one respect.

use crate::parsoid_data::DataParsoid;
use crate::span::Span;

/// A token in the stream the attribute expander walks.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A run of plain text.
    Text(String),
    /// An HTML- or extension-tag start (or self-closing) marker.
    StartTag(TagToken),
    /// An HTML end tag.
    EndTag(TagToken),
    /// A context-sensitive newline.
    Newline,
    /// An HTML comment.
    Comment(String),
    /// End of the token stream.
    Eof,
}

impl Token {
    /// Returns the tag token, if this is a [`Token::StartTag`] or
    /// [`Token::EndTag`].
    #[must_use]
    pub fn as_tag(&self) -> Option<&TagToken> {
        match self {
            Token::StartTag(t) | Token::EndTag(t) => Some(t),
            _ => None,
        }
    }

    /// Returns a mutable reference to the tag token, if this is a
    /// [`Token::StartTag`] or [`Token::EndTag`].
    pub fn as_tag_mut(&mut self) -> Option<&mut TagToken> {
        match self {
            Token::StartTag(t) | Token::EndTag(t) => Some(t),
            _ => None,
        }
    }

    /// Returns true if this is a `<meta>` tag whose `typeof` is in the
    /// reserved set `mw:(TSRMarker|Placeholder|Transclusion|Param|Includes)`,
    /// which the attribute expander passes through untouched (spec §4.4).
    #[must_use]
    pub fn is_reserved_meta(&self) -> bool {
        let Some(tag) = self.as_tag() else { return false };
        if !tag.name.eq_ignore_ascii_case("meta") {
            return false;
        }
        let Some(typeof_) = tag.get_attrib_str("typeof") else {
            return false;
        };
        typeof_.split_ascii_whitespace().any(|t| {
            t.strip_prefix("mw:").is_some_and(|rest| {
                rest.starts_with("TSRMarker")
                    || rest.starts_with("Placeholder")
                    || rest.starts_with("Transclusion")
                    || rest.starts_with("Param")
                    || rest.starts_with("Includes")
            })
        })
    }
}

/// An HTML- or extension-tag token: start, end, or self-closing.
#[derive(Clone, Debug, PartialEq)]
pub struct TagToken {
    /// The tag name, lowercased.
    pub name: String,
    /// The tag's ordered attribute list.
    pub attribs: Vec<Kv>,
    /// Whether the tag is self-closing (void).
    pub self_closing: bool,
    /// Source-range bookkeeping for this token.
    pub data_parsoid: DataParsoid,
}

impl TagToken {
    /// Creates a new tag token with no attributes and default bookkeeping.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribs: Vec::new(),
            self_closing: false,
            data_parsoid: DataParsoid::default(),
        }
    }

    /// Looks up a plain-string attribute value by key, ignoring attributes
    /// whose key or value is still a token list.
    #[must_use]
    pub fn get_attrib_str(&self, key: &str) -> Option<&str> {
        self.attribs.iter().find_map(|kv| {
            (kv.k.as_str()?.eq_ignore_ascii_case(key))
                .then(|| kv.v.as_str())
                .flatten()
        })
    }

    /// Returns the index of the first attribute whose key string-equals
    /// `key`.
    #[must_use]
    pub fn find_attrib_index(&self, key: &str) -> Option<usize> {
        self.attribs
            .iter()
            .position(|kv| kv.k.as_str().is_some_and(|k| k.eq_ignore_ascii_case(key)))
    }
}

/// An attribute key or value: either a resolved string, or a list of tokens
/// awaiting further expansion (spec §3.2).
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// A fully-resolved string.
    Str(String),
    /// An unresolved (or partially resolved) token list.
    Tokens(Vec<Token>),
}

impl AttrValue {
    /// Returns the string value, if resolved.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Tokens(_) => None,
        }
    }

    /// Returns the token list, if unresolved.
    #[must_use]
    pub fn as_tokens(&self) -> Option<&[Token]> {
        match self {
            AttrValue::Tokens(t) => Some(t),
            AttrValue::Str(_) => None,
        }
    }

    /// Returns true if this value is still a token list.
    #[must_use]
    pub fn is_tokens(&self) -> bool {
        matches!(self, AttrValue::Tokens(_))
    }

    /// Returns true if this value is the empty string, or an empty token
    /// list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            AttrValue::Str(s) => s.is_empty(),
            AttrValue::Tokens(t) => t.is_empty(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<Vec<Token>> for AttrValue {
    fn from(value: Vec<Token>) -> Self {
        AttrValue::Tokens(value)
    }
}

/// The source-text byte ranges of an attribute's key and value (spec §3.2).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KvOffsets {
    /// The span of the key in the frame's source.
    pub key: Option<Span>,
    /// The span of the value in the frame's source.
    pub value: Option<Span>,
}

/// An attribute key-value pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Kv {
    /// The attribute key.
    pub k: AttrValue,
    /// The attribute value.
    pub v: AttrValue,
    /// Original source text of the key, if known.
    pub ksrc: Option<String>,
    /// Original source text of the value, if known.
    pub vsrc: Option<String>,
    /// Source offsets of the key and value.
    pub src_offsets: Option<KvOffsets>,
}

impl Kv {
    /// Creates a new plain-string `Kv`, with no source bookkeeping. Useful
    /// for attributes synthesized during expansion rather than parsed from
    /// source.
    #[must_use]
    pub fn new(k: impl Into<AttrValue>, v: impl Into<AttrValue>) -> Self {
        Self {
            k: k.into(),
            v: v.into(),
            ksrc: None,
            vsrc: None,
            src_offsets: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_reserved_meta() {
        let mut tag = TagToken::new("meta");
        tag.attribs.push(Kv::new("typeof", "mw:Transclusion"));
        assert!(Token::StartTag(tag).is_reserved_meta());

        let mut other = TagToken::new("meta");
        other.attribs.push(Kv::new("typeof", "mw:Placeholder/Fragment"));
        assert!(Token::StartTag(other).is_reserved_meta());

        let mut unrelated = TagToken::new("meta");
        unrelated.attribs.push(Kv::new("typeof", "mw:Other"));
        assert!(!Token::StartTag(unrelated).is_reserved_meta());

        assert!(!Token::StartTag(TagToken::new("div")).is_reserved_meta());
    }

    #[test]
    fn test_get_attrib_str() {
        let mut tag = TagToken::new("span");
        tag.attribs.push(Kv::new("class", "foo"));
        assert_eq!(tag.get_attrib_str("class"), Some("foo"));
        assert_eq!(tag.get_attrib_str("CLASS"), Some("foo"));
        assert_eq!(tag.get_attrib_str("id"), None);
    }
}
