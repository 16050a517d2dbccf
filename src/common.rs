//! Small text utilities shared by the tokenizer-facing helpers and the
//! serializer handlers.

use html_escape::NAMED_ENTITIES;
use std::borrow::Cow;

/// Performs simultaneous, longest-match-first string replacement, similar to
/// [`strtr`](https://php.net/strtr) with an array argument.
pub(crate) fn strtr<'a>(input: &'a str, replacements: &[(&str, &str)]) -> Cow<'a, str> {
    let replacements = if replacements.is_sorted_by(|(a, _), (b, _)| a.len() >= b.len()) {
        Cow::Borrowed(replacements)
    } else {
        let mut replacements = Vec::from(replacements);
        replacements.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        Cow::Owned(replacements)
    };

    let mut iter = input.char_indices();
    let mut out = String::new();
    let mut flushed = 0;
    'next: while iter.offset() != input.len() {
        for (find, replace) in replacements.iter() {
            if iter.as_str().starts_with(find) {
                out += &input[flushed..iter.offset()];
                out += *replace;
                flushed = iter.offset() + find.len();
                for _ in 0..find.len() {
                    iter.next();
                }
                continue 'next;
            }
        }
        iter.next();
    }

    if flushed == 0 {
        Cow::Borrowed(input)
    } else {
        out += &input[flushed..];
        Cow::Owned(out)
    }
}

/// Decodes HTML entities according to the Wikitext rules.
///
/// Unlike a strict HTML5 tokenizer, unterminated (no trailing `;`) entities
/// are never recognized, since Wikitext does not implement the legacy
/// entity-without-semicolon rules.
pub(crate) fn decode_html(text: &str) -> Cow<'_, str> {
    const MAX_LEN: usize = {
        let mut max = 0;
        let mut entities = NAMED_ENTITIES.as_slice();
        while let [(name, _), rest @ ..] = entities {
            if name.len() > max {
                max = name.len();
            }
            entities = rest;
        }
        max + b";".len()
    };

    let bytes = text.as_bytes();
    let entity_ranges = memchr_iter(b'&', bytes).filter_map(|start| {
        let next = start + 1;
        memchr(b';', &bytes[next..(next + MAX_LEN).min(bytes.len())]).map(|len| start..(next + len + 1))
    });

    let mut flushed = 0;
    let mut out = String::new();
    for range in entity_ranges {
        let mut char_buf = [0; 4];
        let name = &text[range.start + 1..range.end - 1];
        let value = if let Some(name) = name.strip_prefix('#') {
            if let Some(name) = name.strip_prefix(|c: char| matches!(c, 'X' | 'x')) {
                u32::from_str_radix(name, 16)
            } else {
                name.parse::<u32>()
            }
            .ok()
            .and_then(char::from_u32)
            .map(|c| &*c.encode_utf8(&mut char_buf))
        } else {
            NAMED_ENTITIES
                .binary_search_by(|(t_name, _)| t_name.cmp(&name.as_bytes()))
                .ok()
                .map(|index| NAMED_ENTITIES[index].1)
        };
        if let Some(value) = value {
            out += &text[flushed..range.start];
            out += value;
            flushed = range.end;
        }
    }

    if flushed != 0 {
        out += &text[flushed..];
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

/// Finds every occurrence of `needle` in `haystack`.
fn memchr_iter(needle: u8, haystack: &[u8]) -> impl Iterator<Item = usize> + '_ {
    haystack
        .iter()
        .enumerate()
        .filter_map(move |(i, &b)| (b == needle).then_some(i))
}

/// Finds the first occurrence of `needle` in `haystack`.
fn memchr(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}
