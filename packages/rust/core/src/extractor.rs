//! Heading extraction and anchor injection.
//!
//! Parses article HTML leniently, finds root and sub headings, derives a
//! stable anchor id for each, and prepends an `<a class="anchor">` element to
//! every heading before re-serializing the document.
//!
//! Re-extracting already rendered HTML is safe: headings marked
//! `data-anchored` keep the anchor they carry, and a previously rendered
//! outline block is dropped so its title is never taken for a heading.

use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node};
use tracing::{debug, instrument, trace};

use contentlist_shared::HeadingRecord;

use crate::outline::OUTLINE_ID;
use crate::translit::anchor_id;

/// Attribute marking a heading that already carries an injected anchor.
const ANCHORED_ATTR: &str = "data-anchored";

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which elements count as root and sub headings.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Element name of level-1 headings.
    pub root_tag: String,
    /// Element name of level-2 headings.
    pub sub_tag: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            root_tag: "h2".into(),
            sub_tag: "h3".into(),
        }
    }
}

/// Result of running the extractor over one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Re-serialized HTML with anchors injected.
    pub html: String,
    /// Heading records sorted by document position.
    pub headings: Vec<HeadingRecord>,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Stateless heading extractor; one instance can serve any number of documents.
#[derive(Debug, Clone)]
pub struct HeadingExtractor {
    root_tag: String,
    sub_tag: String,
}

impl Default for HeadingExtractor {
    fn default() -> Self {
        Self::new(&ExtractOptions::default())
    }
}

impl HeadingExtractor {
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            root_tag: options.root_tag.trim().to_ascii_lowercase(),
            sub_tag: options.sub_tag.trim().to_ascii_lowercase(),
        }
    }

    /// Anchor every root/sub heading in `html` and return the heading records.
    ///
    /// Never fails: malformed markup is repaired by the parser and a document
    /// without headings comes back re-serialized but otherwise unchanged.
    #[instrument(skip_all, fields(len = html.len()))]
    pub fn extract(&self, html: &str) -> Extraction {
        let input = html.strip_prefix('\u{feff}').unwrap_or(html);
        let full_document = looks_like_document(input);

        let mut doc = if full_document {
            Html::parse_document(input)
        } else {
            Html::parse_fragment(input)
        };

        if !doc.errors.is_empty() {
            trace!(errors = doc.errors.len(), "suppressed HTML parse errors");
        }

        let stale_outlines: Vec<_> = doc
            .tree
            .root()
            .descendants()
            .filter(|node| match node.value() {
                Node::Element(element) => {
                    element.name() == "section" && element.id() == Some(OUTLINE_ID)
                }
                _ => false,
            })
            .map(|node| node.id())
            .collect();
        for node_id in &stale_outlines {
            if let Some(mut node) = doc.tree.get_mut(*node_id) {
                node.detach();
            }
        }
        if !stale_outlines.is_empty() {
            debug!(count = stale_outlines.len(), "dropped previously rendered outline");
        }

        // Snapshot pass: collect every heading before touching the tree.
        let slots: Vec<_> = doc
            .tree
            .root()
            .descendants()
            .filter_map(|node| match node.value() {
                Node::Element(element) if element.name() == self.root_tag => {
                    Some((node.id(), true))
                }
                Node::Element(element) if element.name() == self.sub_tag => {
                    Some((node.id(), false))
                }
                _ => None,
            })
            .enumerate()
            .map(|(index, (node_id, is_root))| (node_id, index + 1, is_root))
            .collect();

        // Root headings first, then sub headings; document order is restored below.
        let (roots, subs): (Vec<_>, Vec<_>) = slots.into_iter().partition(|slot| slot.2);

        let mut headings = Vec::with_capacity(roots.len() + subs.len());
        let mut anchored = 0usize;

        for (node_id, position, is_root) in roots.into_iter().chain(subs) {
            let Some(heading) = doc.tree.get(node_id).and_then(ElementRef::wrap) else {
                continue;
            };

            let text = heading_text(heading);
            let existing_id = match heading.value().attr(ANCHORED_ATTR) {
                Some(_) => existing_anchor_id(heading),
                None => None,
            };
            let needs_anchor = existing_id.is_none();

            let record = HeadingRecord {
                id: existing_id.unwrap_or_else(|| anchor_id(&text, position)),
                text,
                is_root,
                position,
            };

            if needs_anchor {
                if let Some(mut node) = doc.tree.get_mut(node_id) {
                    if let Node::Element(element) = node.value() {
                        set_attribute(element, ANCHORED_ATTR, "");
                    }
                    node.prepend(anchor_node(&record));
                    anchored += 1;
                }
            }

            headings.push(record);
        }

        headings.sort_by_key(|record| record.position);

        debug!(
            headings = headings.len(),
            roots = headings.iter().filter(|h| h.is_root).count(),
            anchored,
            "headings extracted"
        );

        let html = if full_document {
            doc.html()
        } else {
            doc.root_element().inner_html()
        };

        Extraction { html, headings }
    }
}

// ---------------------------------------------------------------------------
// Input normalization
// ---------------------------------------------------------------------------

/// Decode raw bytes into UTF-8 text, replacing invalid sequences.
pub fn normalize_input(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&*text).to_string()
}

fn looks_like_document(html: &str) -> bool {
    let mut rest = html.trim_start();
    while let Some(comment) = rest.strip_prefix("<!--") {
        match comment.find("-->") {
            Some(end) => rest = comment[end + 3..].trim_start(),
            None => return false,
        }
    }

    let head: String = rest
        .chars()
        .take(9)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

/// Plain text of a heading with nested markup stripped.
fn heading_text(heading: ElementRef<'_>) -> String {
    heading.text().collect::<String>().trim().to_string()
}

/// `name` of the injected anchor a heading already carries.
fn existing_anchor_id(heading: ElementRef<'_>) -> Option<String> {
    heading
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "a" && child.value().classes().any(|c| c == "anchor"))
        .and_then(|anchor| anchor.value().attr("name"))
        .map(str::to_string)
}

/// Build `<a class="anchor" href="#id" data-text="text" name="id"></a>`.
fn anchor_node(record: &HeadingRecord) -> Node {
    Node::Element(Element::new(
        QualName::new(None, Namespace::from(HTML_NS), LocalName::from("a")),
        vec![
            attribute("class", "anchor"),
            attribute("href", &format!("#{}", record.id)),
            attribute("data-text", &record.text),
            attribute("name", &record.id),
        ],
    ))
}

fn attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from_slice(value),
    }
}

fn set_attribute(element: &mut Element, name: &str, value: &str) {
    if let Some(index) = element
        .attrs
        .iter()
        .position(|(attr_name, _)| attr_name.local.as_ref() == name)
    {
        element.attrs[index].1 = StrTendril::from_slice(value);
    } else {
        element.attrs.push((
            QualName::new(None, Namespace::from(""), LocalName::from(name)),
            StrTendril::from_slice(value),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    fn extract(html: &str) -> Extraction {
        HeadingExtractor::new(&ExtractOptions::default()).extract(html)
    }

    fn select<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
        let selector = Selector::parse(css).expect("valid selector");
        doc.select(&selector).collect()
    }

    #[test]
    fn records_follow_document_order() {
        let result = extract("<h2>Intro</h2><p>x</p><h3>Sub A</h3><h2>Next</h2>");

        let summary: Vec<(&str, bool, usize)> = result
            .headings
            .iter()
            .map(|h| (h.text.as_str(), h.is_root, h.position))
            .collect();
        assert_eq!(
            summary,
            vec![("Intro", true, 1), ("Sub A", false, 2), ("Next", true, 3)]
        );
        assert_eq!(result.headings[0].id, "intro-1");
        assert_eq!(result.headings[1].id, "sub-a-2");
        assert_eq!(result.headings[2].id, "next-3");
    }

    #[test]
    fn anchor_is_prepended_with_contract_attributes() {
        let result = extract("<h2>Intro</h2>");
        let doc = Html::parse_fragment(&result.html);

        let anchors = select(&doc, "h2 > a.anchor:first-child");
        assert_eq!(anchors.len(), 1);

        let anchor = anchors[0].value();
        assert_eq!(anchor.attr("href"), Some("#intro-1"));
        assert_eq!(anchor.attr("name"), Some("intro-1"));
        assert_eq!(anchor.attr("data-text"), Some("Intro"));

        let heading = select(&doc, "h2")[0];
        assert!(heading.value().attr(ANCHORED_ATTR).is_some());
        assert_eq!(heading.text().collect::<String>(), "Intro");
    }

    #[test]
    fn existing_children_keep_their_order() {
        let result = extract("<h2>Hello <em>big</em> <b>world</b></h2>");
        let doc = Html::parse_fragment(&result.html);
        let heading = select(&doc, "h2")[0];

        let names: Vec<&str> = heading
            .children()
            .filter_map(ElementRef::wrap)
            .map(|child| child.value().name())
            .collect();
        assert_eq!(names, vec!["a", "em", "b"]);
        assert_eq!(result.headings[0].text, "Hello big world");
        assert_eq!(result.headings[0].id, "hello-big-world-1");
    }

    #[test]
    fn empty_heading_gets_position_only_id() {
        let result = extract("<h2></h2><h3>  </h3>");
        assert_eq!(result.headings[0].id, "-1");
        assert_eq!(result.headings[1].id, "-2");
        assert_eq!(result.headings[0].text, "");

        let doc = Html::parse_fragment(&result.html);
        assert_eq!(select(&doc, "a.anchor").len(), 2);
    }

    #[test]
    fn duplicate_text_yields_unique_ids() {
        let result = extract("<h2>Notes</h2><h3>Notes</h3><h2>Notes</h2>");
        let ids: Vec<&str> = result.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["notes-1", "notes-2", "notes-3"]);
    }

    #[test]
    fn extraction_is_deterministic() {
        let html = "<h2>Привет</h2><h3>Мир</h3>";
        let first = extract(html);
        let second = extract(html);
        assert_eq!(first.headings, second.headings);
        assert_eq!(first.html, second.html);
        assert_eq!(first.headings[0].id, "privet-1");
        assert_eq!(first.headings[1].text, "Мир");
    }

    #[test]
    fn already_anchored_headings_are_not_anchored_twice() {
        let once = extract("<h2>Intro</h2><h3>Sub</h3>");
        let twice = extract(&once.html);

        let doc = Html::parse_fragment(&twice.html);
        assert_eq!(select(&doc, "a.anchor").len(), 2);
        assert_eq!(once.headings, twice.headings);
    }

    #[test]
    fn reanchoring_keeps_existing_anchor_ids() {
        let once = extract("<h2>Intro</h2><h3>Sub</h3>");
        let edited = format!("<h2>New</h2>{}", once.html);
        let twice = extract(&edited);

        let ids: Vec<&str> = twice.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["new-1", "intro-1", "sub-2"]);

        let doc = Html::parse_fragment(&twice.html);
        assert_eq!(select(&doc, "a.anchor").len(), 3);
        for record in &twice.headings {
            let css = format!(r#"a.anchor[name="{}"]"#, record.id);
            assert_eq!(select(&doc, &css).len(), 1, "no anchor for {}", record.id);
        }
    }

    #[test]
    fn anchored_heading_without_anchor_gets_one() {
        let result = extract(r#"<h2 data-anchored="">Lost</h2>"#);
        assert_eq!(result.headings[0].id, "lost-1");

        let doc = Html::parse_fragment(&result.html);
        let anchors = select(&doc, "h2 > a.anchor");
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].value().attr("name"), Some("lost-1"));
    }

    #[test]
    fn rendered_outline_is_not_a_heading() {
        let html = concat!(
            r#"<section class="contentlist" id="_contentlist"><h2 class="contentlist__title">Content</h2>"#,
            r##"<ul class="contentlist__list"><li><a href="#intro-1">Intro</a></li></ul></section>"##,
            "<h2>Intro</h2>"
        );
        let result = extract(html);

        assert_eq!(result.headings.len(), 1);
        assert_eq!(result.headings[0].id, "intro-1");
        assert!(!result.html.contains("_contentlist"));
    }

    #[test]
    fn sub_heading_before_any_root_is_still_anchored() {
        let result = extract("<h3>Orphan</h3><h2>Root</h2>");
        assert_eq!(result.headings[0].text, "Orphan");
        assert!(!result.headings[0].is_root);

        let doc = Html::parse_fragment(&result.html);
        let anchors = select(&doc, "h3 > a.anchor");
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].value().attr("name"), Some("orphan-1"));
    }

    #[test]
    fn no_headings_returns_normalized_input() {
        let result = extract("<p>Just <b>text</b></p><h4>Deep</h4>");
        assert!(result.headings.is_empty());
        assert_eq!(result.html, "<p>Just <b>text</b></p><h4>Deep</h4>");
    }

    #[test]
    fn malformed_markup_is_tolerated() {
        let result = extract("<h2>Broken &amp stuff<p>unclosed <div><h3>Inner</h2>");
        assert!(!result.headings.is_empty());
        assert!(result.headings.iter().any(|h| h.text.contains("Broken")));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let result = extract(r#"<h2>Say "hi" &amp; <i>bye</i></h2>"#);
        assert_eq!(result.headings[0].text, r#"Say "hi" & bye"#);

        let doc = Html::parse_fragment(&result.html);
        let anchor = select(&doc, "a.anchor")[0];
        assert_eq!(anchor.value().attr("data-text"), Some(r#"Say "hi" & bye"#));
    }

    #[test]
    fn full_documents_keep_their_shell() {
        let result = extract(
            "<!DOCTYPE html><html><head><title>T</title></head><body><h2>Intro</h2></body></html>",
        );
        assert!(result.html.starts_with("<!DOCTYPE html>"));
        assert!(result.html.contains("<title>T</title>"));
        assert_eq!(result.headings.len(), 1);
    }

    #[test]
    fn document_after_leading_comment_keeps_its_shell() {
        let result = extract(
            "<!-- generated --><!DOCTYPE html><html><head></head><body><h2>Intro</h2></body></html>",
        );
        assert!(result.html.contains("<!DOCTYPE html>"));
        assert!(result.html.contains("<body>"));
        assert_eq!(result.headings.len(), 1);

        assert!(looks_like_document("  <!-- a --> <!-- b --><html>"));
        assert!(!looks_like_document("<!-- a --><h2>x</h2>"));
        assert!(!looks_like_document("<!-- unterminated <html>"));
    }

    #[test]
    fn custom_heading_tags() {
        let extractor = HeadingExtractor::new(&ExtractOptions {
            root_tag: "H1".into(),
            sub_tag: "h2".into(),
        });
        let result = extractor.extract("<h1>Top</h1><h2>Below</h2><h3>Ignored</h3>");
        assert_eq!(result.headings.len(), 2);
        assert!(result.headings[0].is_root);
        assert!(!result.headings[1].is_root);
    }

    #[test]
    fn byte_input_is_normalized() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("<h2>Заголовок</h2>".as_bytes());
        bytes.push(0xFF);

        let text = normalize_input(&bytes);
        assert!(text.starts_with("<h2>Заголовок</h2>"));
        assert!(text.ends_with('\u{fffd}'));
    }
}
