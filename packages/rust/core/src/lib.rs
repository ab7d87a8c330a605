//! Heading extraction and outline assembly for rendered article HTML.
//!
//! The [`render()`] hook ties the pieces together: [`extractor`] anchors every
//! root/sub heading, [`outline`] groups the headings into a two-level list and
//! renders the `contentlist` block. [`prefs`] holds the per-article
//! preference policy backed by `contentlist-storage`.

pub mod extractor;
pub mod outline;
pub mod prefs;
pub mod render;
pub mod translit;

pub use extractor::{ExtractOptions, Extraction, HeadingExtractor, normalize_input};
pub use outline::OutlineBuilder;
pub use render::{RenderOptions, Rendered, render, render_with};
