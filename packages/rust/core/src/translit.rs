//! Transliteration of heading text into URL-safe anchor slugs.

/// Map arbitrary text to a lowercase ASCII slug.
///
/// Non-Latin scripts are approximated phonetically (`"Привет"` → `"privet"`),
/// runs of spaces and punctuation collapse into a single `-`, and leading or
/// trailing separators are dropped. Empty or symbol-only input yields `""`.
pub fn transliterate(text: &str) -> String {
    slug::slugify(text)
}

/// Anchor id for a heading: `transliterate(text) + "-" + position`.
///
/// The position suffix keeps ids unique when heading text repeats.
pub fn anchor_id(text: &str, position: usize) -> String {
    format!("{}-{position}", transliterate(text))
}
