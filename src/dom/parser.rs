use crate::dom::{Document, NodeId};
use scraper::{ElementRef, Html, Node};

/// Parse a raw HTML string into an arena [`Document`].
///
/// Every text node is kept, whitespace-only ones included: whitespace
/// collapsing is a rendering decision made later by the extractor.
pub fn parse_html(html: &str, url: &str) -> Document {
    let parsed = Html::parse_document(html);

    let title = scraper::Selector::parse("title")
        .ok()
        .and_then(|sel| parsed.select(&sel).next())
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    let mut doc = Document::new();
    let root = doc.root();
    convert_element(&mut doc, root, parsed.root_element());
    doc.url = url.to_string();
    doc.title = title.trim().to_string();
    log::debug!("parsed {} nodes from {}", doc.node_count(), url);
    doc
}

/// Plain text of an HTML fragment (used for pasted `text/html`).
pub fn fragment_text(html: &str) -> String {
    Html::parse_fragment(html).root_element().text().collect()
}

fn convert_element(doc: &mut Document, parent: NodeId, el: ElementRef<'_>) {
    let id = doc.create_element(el.value().name());
    for (k, v) in el.value().attrs() {
        // Fresh nodes always resolve.
        let _ = doc.set_attribute(id, k, v);
    }
    if doc.append_child(parent, id).is_err() {
        return;
    }

    for child_ref in el.children() {
        match child_ref.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child_ref) {
                    convert_element(doc, id, child_el);
                }
            }
            Node::Text(t) => {
                let text = doc.create_text(&*t.text);
                let _ = doc.append_child(id, text);
            }
            Node::Comment(c) => {
                let comment = doc.create_comment(&*c.comment);
                let _ = doc.append_child(id, comment);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_html() {
        let html = r#"
        <html>
            <head><title>Test Page</title></head>
            <body>
                <h1>Hello, world</h1>
                <p id="x">Content paragraph</p>
            </body>
        </html>
        "#;

        let doc = parse_html(html, "https://example.com");
        assert_eq!(doc.title, "Test Page");
        assert_eq!(doc.url, "https://example.com");
        let p = doc.element_by_id("x").unwrap();
        assert_eq!(doc.tag(p), Some("p"));
        assert_eq!(doc.text_content(p), "Content paragraph");
        assert_eq!(doc.tag(doc.body().unwrap()), Some("body"));
    }

    #[test]
    fn keeps_whitespace_and_script_nodes() {
        let doc = parse_html("<body><p>a</p> <script>alert(1)</script></body>", "");
        let body = doc.body().unwrap();
        let text = doc.text_content(body);
        assert!(text.contains(' '));
        assert!(text.contains("alert"));
    }

    #[test]
    fn fragment_text_strips_markup() {
        assert_eq!(fragment_text("<b>bold</b> and <i>it</i>"), "bold and it");
    }
}
