//! Table of contents page

use crate::epub::TocTree;

/// Render the TOC page of a book.
///
/// Entry links are relative to `<base href="/epub_read/{book_id}/">`, so a
/// target is just its archive path plus anchor. Entries without a target are
/// rendered as plain headings.
pub fn render_toc(title: &str, book_id: &str, toc: &TocTree) -> String {
    let title = html_escape::encode_text(title);
    let mut out = String::from("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/>");
    out.push_str(&format!(
        r#"<title>{} - Table of Contents</title><base href="/epub_read/{}/"/></head>"#,
        title, book_id
    ));
    out.push_str(&format!("<body><h1>{}</h1>", title));

    for (level, node) in toc.walk() {
        out.push_str("<div>");
        for _ in 0..level {
            out.push_str("&emsp;");
        }
        let label = html_escape::encode_text(&node.title);
        match &node.target {
            Some(target) => out.push_str(&format!(
                r#"<a href="{}">{}</a>"#,
                html_escape::encode_double_quoted_attribute(&target.href()),
                label
            )),
            None => out.push_str(&label),
        }
        out.push_str("</div>");
    }

    out.push_str("</body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::{TocNode, TocSource, TocTarget};

    fn target(path: &str, anchor: Option<&str>) -> Option<TocTarget> {
        Some(TocTarget {
            chapter: None,
            path: path.to_string(),
            anchor: anchor.map(str::to_string),
        })
    }

    #[test]
    fn test_render_nested_toc() {
        let mut part = TocNode::new("Part <One>", None);
        part.children
            .push(TocNode::new("Section A", target("OEBPS/ch1.xhtml", Some("a"))));
        let mut root = TocNode::default();
        root.children.push(part);
        root.children
            .push(TocNode::new("Chapter 2", target("OEBPS/text/ch 2.xhtml", None)));
        let toc = TocTree {
            source: TocSource::Synthesized,
            root,
        };

        let page = render_toc("A & B", "Ym9vaw", &toc);
        assert!(page.contains("<title>A &amp; B - Table of Contents</title>"));
        assert!(page.contains(r#"<base href="/epub_read/Ym9vaw/"/>"#));
        assert!(page.contains("<div>Part &lt;One&gt;</div>"));
        assert!(page.contains(r#"<div>&emsp;<a href="OEBPS/ch1.xhtml#a">Section A</a></div>"#));
        assert!(page.contains(r#"<div><a href="OEBPS/text/ch%202.xhtml">Chapter 2</a></div>"#));
    }
}
