//! The language-variant serializer handler (C5b, spec §4.6): emits
//! `-{flags|body}-` wikitext from an element's `data-mw-variant` payload.
//!
//! The flag-canonicalization table (step 5) is applied as a flat sequence of
//! guard clauses in the same style as [`crate::html2wt::meta`]'s decision
//! tree, since each row is an independent rewrite rather than a single
//! dispatch. Text substitution for the legacy-shape rename (step 2) borrows
//! the teacher's `strtr`-style "apply once, longest match" instinct from
//! `src/common.rs`, though here the rename is just a key lookup rather than
//! a string rewrite.

use core::fmt::Write as _;
use std::collections::HashSet;

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::dom::store::DomDataStore;
use crate::dom::Handle;
use crate::env::{flag, Env, LC_NAME_MAP};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::html2wt::SerializerState;
use crate::parsoid_data::DataParsoid;

/// The canonical flag ordering used to serialize the working flag set (spec
/// §4.6 step 6). A standard JSON object (as `data-mw-variant` and
/// `data-parsoid.fl` are) does not preserve key insertion order, so the
/// original per-flag position cannot be recovered; this fixed order is the
/// documented fallback (see `DESIGN.md`).
const FLAG_ORDER: [char; 7] = ['D', 'A', 'H', flag::DOLLAR_S, 'T', 'R', '-'];

enum Body {
    Filter { langs: Vec<String>, text: String },
    Disabled(String),
    Name(String),
    Twoway(Vec<(String, String)>),
    Oneway(Vec<(String, String, String)>),
}

/// Emits an element's `data-mw-variant` as `-{flags|body}-` (spec §4.6).
pub fn handle(
    node: &Handle,
    state: &mut SerializerState,
    store: &DomDataStore,
    env: &dyn Env,
    frame: Option<&Frame<'_>>,
) -> Result<()> {
    let Some(raw) = node.get_attr("data-mw-variant") else {
        return (crate::html2wt::generic_handler().handle)(node, state, store, env, frame);
    };
    let value: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            env.log(log::Level::Warn, &format_args!("data-mw-variant is not valid JSON: {e}; falling back"));
            return (crate::html2wt::generic_handler().handle)(node, state, store, env, frame);
        }
    };

    let dp = store.data_parsoid(node, env);
    let (body, explicit_flags) = match parse_variant(&value) {
        Ok(parsed) => parsed,
        Err(e) => {
            env.log(log::Level::Warn, &format_args!("data-mw-variant shape not recognized: {e}; falling back"));
            return (crate::html2wt::generic_handler().handle)(node, state, store, env, frame);
        }
    };

    let original_flags = original_flags(&dp);
    let mut working = explicit_flags;
    let is_meta = node.tag_name().as_deref() == Some("meta");
    if !is_meta {
        working.insert(flag::DOLLAR_S);
    }
    let has_filter = matches!(body, Body::Filter { .. });
    if !working.contains(&flag::DOLLAR_S) && !working.contains(&'T') && !has_filter {
        working.insert('H');
    }
    canonicalize(&mut working, &original_flags);

    let flags: Vec<char> = FLAG_ORDER.iter().copied().filter(|f| working.contains(f)).collect();
    let flag_str = serialize_flags(&flags);
    let body_str = serialize_body(&body);
    let trailing_semi = dp
        .extra
        .get("trailingSemi")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|_| ";")
        .unwrap_or("");

    write!(state, "-{{")?;
    if flag_str.is_empty() {
        write!(state, "{body_str}")?;
    } else {
        write!(state, "{flag_str}|{body_str}")?;
    }
    write!(state, "{trailing_semi}}}-")?;
    Ok(())
}

fn parse_variant(value: &Value) -> Result<(Body, HashSet<char>)> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Malformed("data-mw-variant is not a JSON object".to_owned()))?;

    let mut body = None;
    let mut flags = HashSet::new();
    for (key, val) in obj {
        match key.as_str() {
            "filter" => body = Some(parse_filter(val)?),
            "disabled" => body = Some(Body::Disabled(parse_raw_text(val)?)),
            "name" => body = Some(Body::Name(parse_raw_text(val)?)),
            "twoway" | "bidir" => body = Some(Body::Twoway(parse_twoway(val)?)),
            "oneway" | "unidir" => body = Some(Body::Oneway(parse_oneway(val)?)),
            other => {
                if let Some(flag) = LC_NAME_MAP.get(other) {
                    flags.insert(*flag);
                }
            }
        }
    }
    let body = body.ok_or_else(|| Error::Malformed("data-mw-variant has no recognized body shape".to_owned()))?;
    Ok((body, flags))
}

fn parse_filter(val: &Value) -> Result<Body> {
    let langs = val
        .get("l")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();
    let text = val.get("t").and_then(Value::as_str).unwrap_or_default().to_owned();
    Ok(Body::Filter { langs, text })
}

fn parse_raw_text(val: &Value) -> Result<String> {
    Ok(val.get("t").and_then(Value::as_str).unwrap_or_default().to_owned())
}

fn parse_twoway(val: &Value) -> Result<Vec<(String, String)>> {
    let rules = val
        .as_array()
        .ok_or_else(|| Error::Malformed("twoway body is not an array".to_owned()))?;
    Ok(rules
        .iter()
        .map(|r| {
            (
                r.get("l").and_then(Value::as_str).unwrap_or_default().to_owned(),
                r.get("t").and_then(Value::as_str).unwrap_or_default().to_owned(),
            )
        })
        .collect())
}

fn parse_oneway(val: &Value) -> Result<Vec<(String, String, String)>> {
    let rules = val
        .as_array()
        .ok_or_else(|| Error::Malformed("oneway body is not an array".to_owned()))?;
    Ok(rules
        .iter()
        .map(|r| {
            (
                r.get("f").and_then(Value::as_str).unwrap_or_default().to_owned(),
                r.get("l").and_then(Value::as_str).unwrap_or_default().to_owned(),
                r.get("t").and_then(Value::as_str).unwrap_or_default().to_owned(),
            )
        })
        .collect())
}

/// The set of flags already present before this handler ran (spec §4.6's
/// `originalFlags`), read from `data-parsoid.fl`'s keys. An absent or empty
/// `fl` means no flags were original, so every canonicalization's
/// "maybe-delete" is free to remove what step 4 added implicitly.
fn original_flags(dp: &DataParsoid) -> HashSet<char> {
    let Some(fl) = dp.extra.get("fl").and_then(Value::as_object) else {
        return HashSet::new();
    };
    fl.keys().filter_map(|k| text_to_flag(k)).collect()
}

fn text_to_flag(s: &str) -> Option<char> {
    match s {
        "D" => Some('D'),
        "A" => Some('A'),
        "H" => Some('H'),
        "T" => Some('T'),
        "R" => Some('R'),
        "-" => Some('-'),
        "$S" => Some(flag::DOLLAR_S),
        "$+" => Some(flag::DOLLAR_PLUS),
        _ => None,
    }
}

fn flag_to_text(c: char) -> &'static str {
    match c {
        'D' => "D",
        'A' => "A",
        'H' => "H",
        'T' => "T",
        'R' => "R",
        '-' => "-",
        flag::DOLLAR_S => "$S",
        flag::DOLLAR_PLUS => "$+",
        _ => "",
    }
}

/// Deletes `f` from `working` unless `f` was already present before this
/// handler ran, per spec §4.6 step 5's repeated "maybe-delete(f)" rule.
fn maybe_delete(working: &mut HashSet<char>, original: &HashSet<char>, f: char) {
    if !original.contains(&f) {
        working.remove(&f);
    }
}

fn canonicalize(working: &mut HashSet<char>, original: &HashSet<char>) {
    if working.len() == 1 && working.contains(&flag::DOLLAR_S) {
        maybe_delete(working, original, flag::DOLLAR_S);
    }
    if working.contains(&'D') && working.contains(&flag::DOLLAR_S) && working.contains(&'A') {
        working.insert('H');
        working.remove(&'A');
    }
    if working.contains(&'D') && !working.contains(&flag::DOLLAR_S) {
        working.insert('A');
        working.remove(&'H');
    }
    if working.contains(&'T') && working.contains(&'A') && !working.contains(&flag::DOLLAR_S) {
        working.remove(&'A');
        working.insert('H');
    }
    if working.contains(&'A') && working.contains(&flag::DOLLAR_S) {
        maybe_delete(working, original, flag::DOLLAR_S);
    }
    if working.contains(&'A') && working.contains(&'H') {
        maybe_delete(working, original, 'A');
    }
    if working.contains(&'R') {
        maybe_delete(working, original, flag::DOLLAR_S);
    }
    if working.contains(&'-') {
        maybe_delete(working, original, 'H');
    }
}

fn serialize_flags(flags: &[char]) -> String {
    flags.iter().map(|&f| flag_to_text(f)).collect::<Vec<_>>().join(",")
}

fn serialize_body(body: &Body) -> String {
    match body {
        Body::Filter { langs, text } => format!("{}:{}", langs.iter().map(|l| protect_lang(l)).collect::<Vec<_>>().join(","), protect_text(text)),
        Body::Disabled(text) | Body::Name(text) => protect_text(text),
        Body::Twoway(rules) => rules
            .iter()
            .map(|(lang, text)| format!("{}:{}", protect_lang(lang), protect_text(text)))
            .collect::<Vec<_>>()
            .join(";"),
        Body::Oneway(rules) => rules
            .iter()
            .map(|(from, to, text)| format!("{}=>{}:{}", protect_lang(from), protect_lang(to), protect_text(text)))
            .collect::<Vec<_>>()
            .join(";"),
    }
}

fn lang_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[a-z][-a-z]+$").expect("static language-code pattern is valid"))
}

/// Wraps `lang` in `<nowiki>` if it does not match the expected
/// `^[a-z][-a-z]+$` shape (spec §4.6 step 7).
fn protect_lang(lang: &str) -> String {
    if lang_code_pattern().is_match(lang) {
        lang.to_owned()
    } else {
        format!("<nowiki>{lang}</nowiki>")
    }
}

/// Wraps `text` in `<nowiki>` if it contains the `}-` sequence that would
/// otherwise be read as the construct's own closing delimiter (spec §4.6
/// step 7).
fn protect_text(text: &str) -> String {
    if text.contains("}-") {
        format!("<nowiki>{text}</nowiki>")
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use crate::env::StaticEnv;

    #[test]
    fn test_twoway_with_no_original_flags_emits_bare_body() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("span");
        node.set_attr(
            "data-mw-variant",
            r#"{"twoway":[{"l":"zh-hans","t":"X"},{"l":"zh-hant","t":"Y"}]}"#,
        );
        store.set_data_parsoid(
            &node,
            &env,
            DataParsoid {
                extra: serde_json::json!({"fl": {}, "flSp": [], "tSp": []})
                    .as_object()
                    .unwrap()
                    .clone(),
                ..Default::default()
            },
        );

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "-{zh-hans:X;zh-hant:Y}-");
    }

    #[test]
    fn test_oneway_renders_from_to_arrow() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("meta");
        node.set_attr("data-mw-variant", r#"{"oneway":[{"l":"zh-hant","f":"zh-hans","t":"X"}],"title":true}"#);

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert_eq!(state.finish(), "-{T|zh-hans=>zh-hant:X}-");
    }

    #[test]
    fn test_invalid_lang_code_is_nowiki_protected() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("meta");
        node.set_attr("data-mw-variant", r#"{"twoway":[{"l":"ZH!","t":"X"}],"title":true}"#);

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert!(state.finish().contains("<nowiki>ZH!</nowiki>"));
    }

    #[test]
    fn test_malformed_json_falls_back_to_generic_handler() {
        let store = DomDataStore::new();
        let env = StaticEnv::new();
        let node = Node::element("span");
        node.set_attr("data-mw-variant", "not json");
        node.append_child(&Node::text("fallback"));

        let mut state = SerializerState::new();
        handle(&node, &mut state, &store, &env, None).unwrap();
        assert!(state.finish().contains("fallback"));
    }
}
