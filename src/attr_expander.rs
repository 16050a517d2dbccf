//! The Attribute Expander (C4, spec §4.4): the densest pass in the core.
//! Resolves attributes whose key or value is still a token list after
//! template expansion, hoists encapsulation markers out of attribute
//! position, and records provenance in a `data-mw` payload when an
//! attribute could not be fully resolved to plain text.

use indexmap::IndexMap;

use crate::data_mw::DataMw;
use crate::env::Env;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::parsoid_data::{AttribPart, TemplatedAttrib};
use crate::token::{AttrValue, Kv, Token};
use crate::tokenizer::{Rule, Tokenizer};

/// Wiki-table elements in which `|` is significant wikitext syntax, so a
/// bare newline inside their attribute list needs the scan-and-split
/// treatment of spec §4.4 step 3.
static TABLE_SYNTAX_TAGS: phf::Set<&'static str> = phf::phf_set! {
    "table", "tbody", "thead", "tfoot", "tr", "td", "th", "caption",
};

/// The cap on attribute-expander retries before emitting `ExpansionLimit`
/// (spec §9 "Token-stream re-entry").
pub const RETRY_CAP: u32 = 40;

/// The result of [`on_any`]: the rewritten tokens to splice into the stream,
/// and whether the token manager should re-invoke the expander on them.
#[derive(Debug, Default)]
pub struct ExpanderResult {
    /// Hoisted metas, the token itself, and any post-newline tokens, in
    /// emission order.
    pub tokens: Vec<Token>,
    /// Index of the rewritten element within `tokens`. A retry re-feeds
    /// exactly this token (spec §9 "Token-stream re-entry"), not a hoisted
    /// meta or a post-newline token.
    pub element_index: usize,
    /// True if any metas were hoisted; the manager should resubmit.
    pub retry: bool,
}

/// Runs the attribute expander over a single token (spec §4.4 `onAny`).
pub fn on_any(token: Token, frame: &Frame<'_>, env: &dyn Env, tokenizer: &dyn Tokenizer) -> ExpanderResult {
    let Token::StartTag(mut tag) | Token::EndTag(mut tag) = token.clone() else {
        return ExpanderResult { tokens: vec![token], element_index: 0, retry: false };
    };
    if token.is_reserved_meta() {
        return ExpanderResult { tokens: vec![token], element_index: 0, retry: false };
    }

    let is_end_tag = matches!(token, Token::EndTag(_));
    let table_syntax = tag.data_parsoid.stx.as_deref() != Some("html")
        && TABLE_SYNTAX_TAGS.contains(tag.name.as_str());

    let mut hoisted_metas = Vec::new();
    let mut post_nl_tokens = Vec::new();
    let mut tmp_data_mw: IndexMap<String, TemplatedAttrib> = IndexMap::new();

    let element_tsr_start = tag.data_parsoid.tsr.map(|s| s.start);
    let attribs = std::mem::take(&mut tag.attribs);
    let mut new_attribs = Vec::with_capacity(attribs.len());

    for mut kv in attribs {
        let key_str = kv.ksrc.clone().unwrap_or_else(|| display_attr(&kv.k));
        let mut touched = false;

        if kv.k.is_tokens() {
            touched |= process_side(
                &mut kv.k,
                table_syntax,
                frame,
                element_tsr_start,
                &mut hoisted_metas,
                &mut post_nl_tokens,
            );
        }
        if kv.v.is_tokens() {
            touched |= process_side(
                &mut kv.v,
                table_syntax,
                frame,
                element_tsr_start,
                &mut hoisted_metas,
                &mut post_nl_tokens,
            );
        }

        // Reparse-KV scenario (spec §4.4 step 6): the value collapsed to
        // nothing, but the resolved key string itself looks like `k=v`.
        if kv.v.is_empty() {
            if let Some(k) = kv.k.as_str() {
                let trimmed = k.trim();
                if trimmed.contains('=') {
                    let rule = if table_syntax { Rule::TableAttributes } else { Rule::GenericNewlineAttributes };
                    if let Some(reparsed) = tokenizer.tokenize_attributes(trimmed, rule) {
                        if !reparsed.is_empty() {
                            record_tmp(&mut tmp_data_mw, &key_str, &kv, true);
                            new_attribs.extend(reparsed);
                            continue;
                        }
                    }
                }
            }
        }

        if touched {
            record_tmp(&mut tmp_data_mw, &key_str, &kv, false);
        }
        new_attribs.push(kv);
    }
    tag.attribs = new_attribs;

    if tag.find_attrib_index("about").is_none() && !tmp_data_mw.is_empty() {
        let attribs: Vec<TemplatedAttrib> = tmp_data_mw.into_values().collect();
        if tag.name.eq_ignore_ascii_case("template") {
            tag.data_parsoid.tmp.templated_attribs = Some(attribs);
        } else {
            let about = env.new_about_id();
            tag.attribs.push(Kv::new("about", about));
            match tag.find_attrib_index("typeof") {
                Some(idx) => {
                    let existing = tag.attribs[idx].v.as_str().unwrap_or_default().to_owned();
                    tag.attribs[idx].v = AttrValue::Str(format!("{existing} mw:ExpandedAttrs").trim().to_owned());
                }
                None => tag.attribs.push(Kv::new("typeof", "mw:ExpandedAttrs")),
            }
            let data_mw = DataMw {
                attribs: Some(attribs),
                ..Default::default()
            };
            match serde_json::to_string(&data_mw) {
                Ok(json) => tag.attribs.push(Kv::new("data-mw", json)),
                Err(e) => env.log(log::Level::Warn, &format_args!("data-mw serialization failed: {e}")),
            }
        }
    }

    let rewritten = if is_end_tag { Token::EndTag(tag) } else { Token::StartTag(tag) };
    let retry = !hoisted_metas.is_empty();
    let element_index = hoisted_metas.len();
    let mut tokens = hoisted_metas;
    tokens.push(rewritten);
    tokens.extend(post_nl_tokens);
    ExpanderResult { tokens, element_index, retry }
}

/// Steps 3–5 (and, for the value, step 7) of spec §4.4, applied to one side
/// (key or value) of a `Kv`. Returns true if anything was hoisted, stripped,
/// or otherwise changed.
fn process_side(
    side: &mut AttrValue,
    table_syntax: bool,
    frame: &Frame<'_>,
    element_tsr_start: Option<usize>,
    hoisted_metas: &mut Vec<Token>,
    post_nl_tokens: &mut Vec<Token>,
) -> bool {
    let Some(tokens) = side.as_tokens() else { return false };
    let nl_pos = if table_syntax {
        tokens.iter().position(|t| matches!(t, Token::Newline))
    } else {
        None
    };

    match nl_pos {
        Some(idx) => {
            // Scenario 1: multi-attribute + trailing content.
            let mut pre_nl: Vec<Token> = tokens[..idx].to_vec();
            let post_nl: Vec<Token> = tokens[idx + 1..].to_vec();

            if let Some(meta_idx) = pre_nl.iter().position(Token::is_reserved_meta) {
                let mut meta_token = pre_nl.remove(meta_idx);
                if let (Some(tag), Some(start)) = (meta_token.as_tag_mut(), element_tsr_start) {
                    let meta_start = tag.data_parsoid.tsr.map(|s| s.start).unwrap_or(start);
                    if let Some(text) = frame.text_at(crate::span::Span::new(start, meta_start)) {
                        tag.data_parsoid.unwrapped_wt = Some(text.to_owned());
                    }
                    tag.data_parsoid.tsr = tag.data_parsoid.tsr.map(|s| crate::span::Span::new(start, s.end));
                }
                hoisted_metas.push(meta_token);
            }
            pre_nl.retain(|t| !t.is_reserved_meta());

            let stripped = strings_differ(tokens, &pre_nl) || !post_nl.is_empty();
            post_nl_tokens.extend(post_nl);
            *side = AttrValue::Tokens(pre_nl);
            resolve_if_plain(side);
            stripped
        }
        None => {
            // Scenario 2: attribute-only; no newline splitting applies.
            let mut retained = tokens.to_vec();
            let before = retained.len();
            retained.retain(|t| !t.is_reserved_meta());
            let has_generated_content = retained.len() != before;
            *side = AttrValue::Tokens(retained);
            resolve_if_plain(side);
            has_generated_content
        }
    }
}

/// If `side` is now a token list containing only a single resolved [`Token::Text`],
/// collapse it to a plain string: the common case after meta-stripping.
fn resolve_if_plain(side: &mut AttrValue) {
    if let AttrValue::Tokens(tokens) = side {
        if let [Token::Text(s)] = tokens.as_slice() {
            *side = AttrValue::Str(s.clone());
        } else if tokens.is_empty() {
            *side = AttrValue::Str(String::new());
        }
    }
}

fn strings_differ(before: &[Token], after: &[Token]) -> bool {
    before.len() != after.len()
}

fn display_attr(value: &AttrValue) -> String {
    match value {
        AttrValue::Str(s) => s.clone(),
        AttrValue::Tokens(tokens) => tokens
            .iter()
            .map(|t| match t {
                Token::Text(s) => s.clone(),
                _ => String::new(),
            })
            .collect(),
    }
}

fn record_tmp(map: &mut IndexMap<String, TemplatedAttrib>, key_str: &str, kv: &Kv, reparsed: bool) {
    let entry = map.entry(key_str.to_owned()).or_default();
    entry.k = AttribPart {
        txt: kv.k.as_str().map(str::to_owned),
        html: kv.ksrc.clone(),
        src_offsets: kv.src_offsets.and_then(|o| o.key).map(Into::into),
    };
    entry.v = if reparsed {
        // SPEC_FULL §B / spec §9 Open Question 3: `html: []` on the value
        // side of a reparsed KV means "no independent provenance", modeled
        // here as no `html` field at all.
        AttribPart {
            txt: kv.v.as_str().map(str::to_owned),
            html: None,
            src_offsets: kv.src_offsets.and_then(|o| o.value).map(Into::into),
        }
    } else {
        AttribPart {
            txt: kv.v.as_str().map(str::to_owned),
            html: kv.vsrc.clone(),
            src_offsets: kv.src_offsets.and_then(|o| o.value).map(Into::into),
        }
    };
}

/// Runs [`on_any`] repeatedly until it stops requesting a retry or
/// [`RETRY_CAP`] is hit (spec §9's "Token-stream re-entry").
pub fn expand_until_stable(
    mut token: Token,
    frame: &Frame<'_>,
    env: &dyn Env,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Token>> {
    // `tokens` is [hoisted_metas…, element, post_nl…]; a retry re-feeds only
    // the element, so hoisted metas and post-newline tokens from every
    // attempt are carried forward here and spliced back around the element
    // once it stabilizes (spec §9's re-entry model).
    let mut pre = Vec::new();
    let mut post = Vec::new();
    for attempt in 0..RETRY_CAP {
        env.log(log::Level::Debug, &format_args!("attribute expander attempt {attempt}"));
        let result = on_any(token, frame, env, tokenizer);
        let retry = result.retry;
        let mut tokens = result.tokens;
        let element = tokens.remove(result.element_index);
        let trailing = tokens.split_off(result.element_index);
        pre.extend(tokens);
        post.extend(trailing);
        if !retry {
            pre.push(element);
            pre.extend(post);
            return Ok(pre);
        }
        token = element;
    }
    Err(Error::ExpansionLimit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnv;
    use crate::token::TagToken;
    use crate::tokenizer::PegTokenizer;

    fn meta_transclusion() -> Token {
        let mut meta = TagToken::new("meta");
        meta.self_closing = true;
        meta.attribs.push(Kv::new("typeof", "mw:Transclusion"));
        Token::StartTag(meta)
    }

    #[test]
    fn test_passthrough_for_reserved_meta() {
        let env = StaticEnv::new();
        let tok = PegTokenizer;
        let frame = Frame::new("");
        let result = on_any(meta_transclusion(), &frame, &env, &tok);
        assert!(!result.retry);
        assert_eq!(result.tokens.len(), 1);
    }

    #[test]
    fn test_passthrough_for_plain_text_token() {
        let env = StaticEnv::new();
        let tok = PegTokenizer;
        let frame = Frame::new("");
        let result = on_any(Token::Text("hi".into()), &frame, &env, &tok);
        assert!(!result.retry);
        assert_eq!(result.tokens, vec![Token::Text("hi".into())]);
    }

    #[test]
    fn test_scenario_2_strips_reserved_meta_from_attribute_only_value() {
        let env = StaticEnv::new();
        let tok = PegTokenizer;
        let frame = Frame::new("");

        let mut tag = TagToken::new("div");
        let hoisted = meta_transclusion();
        let kv = Kv {
            k: AttrValue::Str("class".into()),
            v: AttrValue::Tokens(vec![hoisted, Token::Text("box".into())]),
            ksrc: Some("class".into()),
            vsrc: None,
            src_offsets: None,
        };
        tag.attribs.push(kv);

        let result = on_any(Token::StartTag(tag), &frame, &env, &tok);
        let Token::StartTag(out_tag) = result.tokens.last().cloned().unwrap() else {
            panic!("expected start tag");
        };
        assert_eq!(out_tag.get_attrib_str("class"), Some("box"));
        assert!(out_tag.find_attrib_index("about").is_some());
        assert_eq!(out_tag.get_attrib_str("typeof"), Some("mw:ExpandedAttrs"));
        assert!(!result.retry);
    }

    #[test]
    fn test_expand_until_stable_keeps_hoisted_meta_and_post_nl_on_retry() {
        let env = StaticEnv::new();
        let tok = PegTokenizer;
        let frame = Frame::new("");

        let mut tag = TagToken::new("td");
        let kv = Kv {
            k: AttrValue::Str("class".into()),
            v: AttrValue::Tokens(vec![meta_transclusion(), Token::Newline, Token::Text("content".into())]),
            ksrc: Some("class".into()),
            vsrc: None,
            src_offsets: None,
        };
        tag.attribs.push(kv);

        let out = expand_until_stable(Token::StartTag(tag), &frame, &env, &tok).unwrap();

        // The hoisted `mw:Transclusion` meta must survive, ahead of the
        // rewritten element; the post-newline text must survive after it.
        assert!(out[0].is_reserved_meta());
        let Token::StartTag(element) = &out[1] else {
            panic!("expected the rewritten element second");
        };
        assert_eq!(element.get_attrib_str("class"), Some(""));
        assert_eq!(out[2], Token::Text("content".into()));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_idempotent_second_pass() {
        let env = StaticEnv::new();
        let tok = PegTokenizer;
        let frame = Frame::new("");

        let mut tag = TagToken::new("div");
        tag.attribs.push(Kv::new("class", "box"));
        let first = on_any(Token::StartTag(tag), &frame, &env, &tok);
        assert!(!first.retry);

        let second = on_any(first.tokens[0].clone(), &frame, &env, &tok);
        assert!(!second.retry);
        assert_eq!(second.tokens, first.tokens);
    }
}
