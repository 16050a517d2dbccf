//! The `Env` external collaborator (spec §6): site configuration, the
//! about-ID allocator, and the logger hookup.
//!
//! Modeled on the teacher's `wikitext::config::Configuration` pattern of a
//! `phf`-backed static table behind a small typed accessor, rather than a
//! runtime-loaded map, since these tables are fixed constants of the system
//! (spec §4.6 step 3's `LCNameMap`) or are naturally `'static` (a real site's
//! magic-word table, fetched once at startup by a collaborator out of this
//! crate's scope).

use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel characters standing in for the two multi-character flag names
/// from spec §4.6 ("$S", "$+"), so the flag set can stay a `HashSet<char>`
/// like the teacher's own `LangFlags::Common`.
pub mod flag {
    /// The `$S` flag ("show source" on non-`<meta>` elements).
    pub const DOLLAR_S: char = '\u{E000}';
    /// The `$+` flag (unused by the canonicalization table but part of the
    /// upstream flag vocabulary; reserved so a host can round-trip it).
    pub const DOLLAR_PLUS: char = '\u{E001}';
}

/// `LCNameMap`: the fixed mapping from `data-mw-variant` flag keys to their
/// single-character wikitext flag form (spec §4.6 step 3).
pub static LC_NAME_MAP: phf::Map<&'static str, char> = phf::phf_map! {
    "describe" => 'D',
    "add" => 'A',
    "hidden" => 'H',
    "showflag" => flag::DOLLAR_S,
    "title" => 'T',
    "remove" => 'R',
    "-" => '-',
};

/// The "magic masq" set of page-properties that render as a template-like
/// `{{...}}` invocation rather than a bare `__MAGICWORD__` (spec §4.5
/// step 2).
pub static MAGIC_MASQ: phf::Set<&'static str> = phf::phf_set! {
    "defaultsort",
    "displaytitle",
};

/// Read-only site configuration and process-wide allocators (spec §5, §6).
pub trait Env {
    /// Allocates a new encapsulation-group id, of the form `#mwtN`.
    fn new_about_id(&self) -> String;

    /// Allocates a new, process-unique node id.
    fn new_node_id(&self) -> u64;

    /// Looks up the canonical wikitext source form of a magic word, by its
    /// (lowercased) canonical name, for the meta handler's "otherwise"
    /// branch (spec §4.5 step 2).
    fn magic_word_source(&self, name: &str) -> Option<&str>;

    /// Logs a message at the given level. Default implementation forwards to
    /// the `log` crate; a host may override to route into a different sink
    /// without needing a second indirection at every call site.
    fn log(&self, level: log::Level, msg: &core::fmt::Arguments<'_>) {
        log::log!(level, "{msg}");
    }
}

/// A concrete, `phf`-backed [`Env`] suitable for a single host process.
#[derive(Debug, Default)]
pub struct StaticEnv {
    about_counter: AtomicU64,
    node_counter: AtomicU64,
}

/// A representative slice of MediaWiki's double-underscore magic words and
/// their canonical source form, consulted by the meta handler's "otherwise"
/// branch. A real deployment would source this table from the wiki's live
/// site configuration instead of a compiled-in constant.
static MAGIC_WORDS: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "notoc" => "__NOTOC__",
    "forcetoc" => "__FORCETOC__",
    "toc" => "__TOC__",
    "noeditsection" => "__NOEDITSECTION__",
    "nogallery" => "__NOGALLERY__",
    "hiddencat" => "__HIDDENCAT__",
    "index" => "__INDEX__",
    "noindex" => "__NOINDEX__",
    "staticredirect" => "__STATICREDIRECT__",
    "expectunusedcategory" => "__EXPECTUNUSEDCATEGORY__",
};

impl StaticEnv {
    /// Creates a new `StaticEnv` with both allocators starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Env for StaticEnv {
    fn new_about_id(&self) -> String {
        format!("#mwt{}", self.about_counter.fetch_add(1, Ordering::Relaxed))
    }

    fn new_node_id(&self) -> u64 {
        self.node_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn magic_word_source(&self, name: &str) -> Option<&str> {
        MAGIC_WORDS.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_about_id_monotonic() {
        let env = StaticEnv::new();
        assert_eq!(env.new_about_id(), "#mwt0");
        assert_eq!(env.new_about_id(), "#mwt1");
    }

    #[test]
    fn test_node_id_monotonic() {
        let env = StaticEnv::new();
        assert_eq!(env.new_node_id(), 0);
        assert_eq!(env.new_node_id(), 1);
    }

    #[test]
    fn test_magic_word_lookup() {
        let env = StaticEnv::new();
        assert_eq!(env.magic_word_source("notoc"), Some("__NOTOC__"));
        assert_eq!(env.magic_word_source("nope"), None);
    }

    #[test]
    fn test_lc_name_map() {
        assert_eq!(LC_NAME_MAP.get("describe"), Some(&'D'));
        assert_eq!(LC_NAME_MAP.get("showflag"), Some(&flag::DOLLAR_S));
    }
}
