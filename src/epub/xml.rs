//! roxmltree helpers shared by the package and navigation parsers

use std::borrow::Cow;

use roxmltree::{Document, Node, ParsingOptions};

const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

/// UTF-8 text of an XML entry, without a byte order mark
pub fn text(bytes: &[u8]) -> Result<&str, std::str::Utf8Error> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes)
}

/// Parse a document; DOCTYPE declarations are common in EPUB XHTML
pub fn parse(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    Document::parse_with_options(
        text,
        ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        },
    )
}

/// Rewrite HTML named entities (`&nbsp;`, `&mdash;`, ...) as numeric
/// references. XHTML content documents use them without declaring a DTD.
pub fn numeric_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let name = rest[1..]
            .find(';')
            .map(|end| &rest[1..=end])
            .filter(|name| !name.is_empty() && name.len() <= 32)
            .filter(|name| name.bytes().all(|b| b.is_ascii_alphanumeric()))
            .filter(|name| !XML_ENTITIES.contains(name));
        let decoded = name.map(|name| {
            let reference = format!("&{};", name);
            (reference.len(), html_escape::decode_html_entities(&reference).into_owned())
        });

        match decoded {
            Some((len, value)) if !value.starts_with('&') => {
                for c in value.chars() {
                    out.push_str(&format!("&#x{:X};", c as u32));
                }
                rest = &rest[len..];
                changed = true;
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

pub fn is(node: &Node, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

/// First child element with the given local name
pub fn child<'a, 'input>(node: Node<'a, 'input>, local_name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is(n, local_name))
}

/// Concatenated descendant text with whitespace runs collapsed
pub fn text_content(node: Node) -> String {
    let raw: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
