//! The tokenizer external collaborator (spec §6).
//!
//! The full wikitext tokenizer is out of scope (spec §1); this module
//! implements only the two rules the attribute expander's reparse-KV
//! scenario (spec §4.4 step 6) actually needs, in the teacher's own `peg`
//! grammar style (see the teacher's `wikitext::parser` `table_attribute`
//! and `generic_newline_attribute` rules, which this is a deliberately
//! smaller cousin of).

use crate::span::Span;
use crate::token::{Kv, KvOffsets};
use peg::error::ParseError;
use peg::str::LineCol;

/// The attribute-list grammar a reparse request selects between.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    /// Generic HTML/extension tag attributes: newlines are permitted inside
    /// the list, `|` has no special meaning.
    GenericNewlineAttributes,
    /// Wikitext table attributes: `|` terminates the list (it introduces
    /// the table syntax's own cell/row separator).
    TableAttributes,
}

/// The tokenizer collaborator (spec §6 `tokenizeAs`).
pub trait Tokenizer {
    /// Tokenizes `source` as an attribute list under `rule`. Returns `None`
    /// if the parse failed outright (the caller falls back to treating the
    /// attribute as opaque text, per spec §4.4 step 6's "if this yields
    /// ≥1 KV").
    fn tokenize_attributes(&self, source: &str, rule: Rule) -> Option<Vec<Kv>>;
}

/// The concrete [`Tokenizer`] shipped with this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct PegTokenizer;

impl Tokenizer for PegTokenizer {
    fn tokenize_attributes(&self, source: &str, rule: Rule) -> Option<Vec<Kv>> {
        let result = match rule {
            Rule::GenericNewlineAttributes => grammar::generic_newline_attributes(source),
            Rule::TableAttributes => grammar::table_attributes(source),
        };
        result.ok()
    }
}

/// Parses a single attribute list with the given table-mode setting,
/// producing an error type callers can match on for diagnostics.
pub fn parse_attributes(source: &str, rule: Rule) -> Result<Vec<Kv>, ParseError<LineCol>> {
    match rule {
        Rule::GenericNewlineAttributes => grammar::generic_newline_attributes(source),
        Rule::TableAttributes => grammar::table_attributes(source),
    }
}

peg::parser! {
    grammar grammar() for str {
        pub rule generic_newline_attributes() -> Vec<Kv>
            = _ a:attribute(false) ** _ _ eof() { a }

        pub rule table_attributes() -> Vec<Kv>
            = _ a:attribute(true) ** _ _ eof() { a }

        rule eof() = ![_]

        rule attribute(in_table: bool) -> Kv
            = name_start:position!()
              name:name_text(in_table)
              name_end:position!()
              value:(
                  _ "=" _
                  value_start:position!()
                  v:value_text(in_table)
                  value_end:position!()
                  { (v, value_start, value_end) }
              )?
            {
                let (v, vsrc, value_offsets) = match value {
                    Some((v, vs, ve)) => (v.clone(), Some(v), Some((vs, ve))),
                    None => (name.clone(), None, None),
                };
                Kv {
                    ksrc: Some(name.clone()),
                    vsrc,
                    src_offsets: Some(KvOffsets {
                        key: Some(Span::from((name_start, name_end))),
                        value: value_offsets.map(Span::from),
                    }),
                    k: name.into(),
                    v: v.into(),
                }
            }

        rule name_text(in_table: bool) -> String
            = s:$(name_char(in_table)+) { s.to_owned() }

        rule name_char(in_table: bool) -> ()
            = !['\t' | '\n' | ' ' | '=' | '"' | '\''] c:[_] {?
                if in_table && c == '|' { Err("table cell separator") } else { Ok(()) }
            }

        rule value_text(in_table: bool) -> String
            = "\"" s:$((!['"'] [_])*) "\"" { s.to_owned() }
            / "'" s:$((!['\''] [_])*) "'" { s.to_owned() }
            / s:$(unquoted_value_char(in_table)+) { s.to_owned() }

        rule unquoted_value_char(in_table: bool) -> ()
            = !['\t' | '\n' | ' '] c:[_] {?
                if in_table && c == '|' { Err("table cell separator") } else { Ok(()) }
            }

        rule _() = quiet!{[' ' | '\t' | '\n']*}
    }
}
