//! Render hook called by the host content pipeline on every article render.
//!
//! Headings are always anchored; the outline block is prepended only when the
//! article asks for it and at least one heading was found.

use tracing::{debug, instrument};

use contentlist_shared::{AppConfig, HeadingRecord, OutlinePrefs};

use crate::extractor::{ExtractOptions, HeadingExtractor};
use crate::outline::{DEFAULT_TITLE, OutlineBuilder};

/// Runtime render options — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Heading tags to extract.
    pub extract: ExtractOptions,
    /// Visible outline title.
    pub title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            extract: ExtractOptions::default(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl From<&AppConfig> for RenderOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            extract: ExtractOptions {
                root_tag: config.outline.root_tag.clone(),
                sub_tag: config.outline.sub_tag.clone(),
            },
            title: config.outline.title.clone(),
        }
    }
}

/// Output of a render call.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Final article HTML (outline block, if any, followed by anchored content).
    pub html: String,
    /// Extracted headings in document order.
    pub headings: Vec<HeadingRecord>,
    /// Whether an outline block was prepended.
    pub with_outline: bool,
}

/// Render `content` with default options.
pub fn render(content: &str, prefs: OutlinePrefs) -> String {
    render_with(content, prefs, &RenderOptions::default()).html
}

/// Render `content` with explicit options.
#[instrument(skip_all, fields(len = content.len(), show = prefs.show_outline, one_level = prefs.one_level_only))]
pub fn render_with(content: &str, prefs: OutlinePrefs, options: &RenderOptions) -> Rendered {
    let extraction = HeadingExtractor::new(&options.extract).extract(content);

    if !prefs.show_outline || extraction.headings.is_empty() {
        debug!(headings = extraction.headings.len(), "rendering without outline");
        return Rendered {
            html: extraction.html,
            headings: extraction.headings,
            with_outline: false,
        };
    }

    let outline = OutlineBuilder::new(prefs.one_level_only)
        .with_title(options.title.as_str())
        .build(&extraction.headings);

    Rendered {
        html: format!("{outline}{}", extraction.html),
        headings: extraction.headings,
        with_outline: true,
    }
}
