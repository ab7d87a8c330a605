//! Outline (table of contents) builder.
//!
//! Groups a flat, document-ordered list of [`HeadingRecord`]s into a two-level
//! outline and renders it as the `contentlist` navigation block.

use std::collections::HashMap;

use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::{debug, instrument};

use contentlist_shared::{HeadingRecord, OutlineNode};

/// Default visible title of the outline block.
pub const DEFAULT_TITLE: &str = "Content";

/// `id` of the rendered outline `<section>`.
pub const OUTLINE_ID: &str = "_contentlist";

/// Builds the outline for one render call. Holds no per-document state.
#[derive(Debug, Clone)]
pub struct OutlineBuilder {
    one_level_only: bool,
    title: String,
}

impl OutlineBuilder {
    pub fn new(one_level_only: bool) -> Self {
        Self {
            one_level_only,
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// Replace the visible outline title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Group sub headings under their nearest preceding root heading.
    ///
    /// Sub headings are dropped when `one_level_only` is set or when no root
    /// heading precedes them.
    pub fn group(&self, headings: &[HeadingRecord]) -> Vec<OutlineNode> {
        let mut roots: Vec<HeadingRecord> = Vec::new();
        let mut sublists: HashMap<&str, Vec<HeadingRecord>> = HashMap::new();
        let mut current_root: Option<&str> = None;
        let mut dropped = 0usize;

        for heading in headings {
            if heading.is_root {
                roots.push(heading.clone());
                sublists.entry(heading.id.as_str()).or_default();
                current_root = Some(heading.id.as_str());
                continue;
            }

            match current_root {
                Some(root_id) if !self.one_level_only => {
                    sublists.entry(root_id).or_default().push(heading.clone());
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!(dropped, one_level_only = self.one_level_only, "sub headings left out of outline");
        }

        roots
            .into_iter()
            .map(|root| {
                let children = sublists.remove(root.id.as_str()).unwrap_or_default();
                OutlineNode { root, children }
            })
            .collect()
    }

    /// Group `headings` and render the outline markup.
    #[instrument(skip_all, fields(headings = headings.len(), one_level_only = self.one_level_only))]
    pub fn build(&self, headings: &[HeadingRecord]) -> String {
        let nodes = self.group(headings);
        self.render(&nodes)
    }

    /// Render grouped nodes as the outline section.
    pub fn render(&self, nodes: &[OutlineNode]) -> String {
        let mut html = format!(r#"<section class="contentlist" id="{OUTLINE_ID}">"#);
        html.push_str(&format!(
            r#"<h2 class="contentlist__title" onclick="this.parentElement.classList.toggle('contentlist--closed')">{}</h2>"#,
            encode_text(&self.title)
        ));
        html.push_str(r#"<ul class="contentlist__list">"#);

        for node in nodes {
            html.push_str(r#"<li class="contentlist__item contentlist__root">"#);
            html.push_str(&link(&node.root));

            if !node.children.is_empty() {
                html.push_str(r#"<ul class="contentlist__sublist">"#);
                for child in &node.children {
                    html.push_str(r#"<li class="contentlist__item">"#);
                    html.push_str(&link(child));
                    html.push_str("</li>");
                }
                html.push_str("</ul>");
            }

            html.push_str("</li>");
        }

        html.push_str("</ul></section>");
        html
    }
}

fn link(heading: &HeadingRecord) -> String {
    format!(
        r##"<a href="#{}">{}</a>"##,
        encode_double_quoted_attribute(&heading.id),
        encode_text(&heading.text)
    )
}
