//! Table of contents construction
//!
//! Sources are tried in order: the EPUB 3 navigation document, the legacy
//! NCX, then a flat list made from the spine. A source that is missing,
//! unreadable or empty falls through to the next one, so building a TOC
//! never fails.
//!
//! Nesting is capped at [`MAX_TOC_DEPTH`] levels. Entries below the cap are
//! attached as siblings of the deepest level, in document order.

use roxmltree::Node;

use super::archive::Archive;
use super::href;
use super::types::{BookStructure, TocNode, TocSource, TocTarget, TocTree};
use super::xml;

/// Deepest nesting level kept in a TOC tree
pub const MAX_TOC_DEPTH: usize = 64;

/// Checks whether an archive path names an entry
pub type EntryCheck<'a> = &'a dyn Fn(&str) -> bool;

/// Build the table of contents of a parsed book
pub fn build_toc(archive: &Archive, structure: &BookStructure) -> TocTree {
    let exists = |path: &str| archive.contains(path);
    let candidates = [
        structure.nav.map(|resource| TocSource::Nav { resource }),
        structure.ncx.map(|resource| TocSource::Ncx { resource }),
    ];

    for source in candidates.into_iter().flatten() {
        match load(archive, structure, source, &exists) {
            Ok(entries) if !entries.is_empty() => return tree(structure, source, entries),
            Ok(_) => tracing::debug!(?source, "navigation source has no entries"),
            Err(e) => tracing::warn!(?source, "navigation source unusable: {}", e),
        }
    }

    tree(structure, TocSource::Synthesized, synthesize(structure, &exists))
}

fn tree(structure: &BookStructure, source: TocSource, entries: Vec<TocNode>) -> TocTree {
    TocTree {
        source,
        root: TocNode {
            title: structure.metadata.title.clone().unwrap_or_default(),
            target: None,
            children: entries,
        },
    }
}

fn load(
    archive: &Archive,
    structure: &BookStructure,
    source: TocSource,
    exists: EntryCheck,
) -> Result<Vec<TocNode>, String> {
    let (resource, is_nav) = match source {
        TocSource::Nav { resource } => (resource, true),
        TocSource::Ncx { resource } => (resource, false),
        TocSource::Synthesized => return Ok(synthesize(structure, exists)),
    };

    let path = &structure.resources[resource].path;
    let bytes = archive.read_entry(path, None).map_err(|e| e.to_string())?;
    let text = xml::text(&bytes).map_err(|e| e.to_string())?;
    let parsed = if is_nav {
        parse_nav_document(path, text, structure, exists)
    } else {
        parse_ncx_document(path, text, structure, exists)
    };
    parsed.map_err(|e| e.to_string())
}

/// One entry per spine item, titled with the document's file name
pub fn synthesize(structure: &BookStructure, exists: EntryCheck) -> Vec<TocNode> {
    structure
        .chapters
        .iter()
        .map(|chapter| {
            let resource = structure.chapter_resource(chapter);
            let target = exists(&resource.path).then(|| TocTarget {
                chapter: Some(chapter.index),
                path: resource.path.clone(),
                anchor: None,
            });
            TocNode::new(href::file_name(&resource.path), target)
        })
        .collect()
}

/// Resolves TOC hrefs found in one navigation document
struct Targets<'a> {
    doc_path: &'a str,
    structure: &'a BookStructure,
    exists: EntryCheck<'a>,
}

impl Targets<'_> {
    fn resolve(&self, raw: Option<&str>) -> Option<TocTarget> {
        let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
        let Some(resolved) = href::resolve_in(self.doc_path, raw) else {
            tracing::debug!(href = raw, "TOC href points outside the book");
            return None;
        };
        if !(self.exists)(&resolved.path) {
            tracing::debug!(path = %resolved.path, "TOC href names a missing entry");
            return None;
        }
        Some(TocTarget {
            chapter: self.structure.chapter_index_of(&resolved.path),
            path: resolved.path,
            anchor: resolved.fragment,
        })
    }

    /// Node for a label and target; unlabeled entries borrow the file name
    fn node(&self, title: String, target: Option<TocTarget>) -> Option<TocNode> {
        match (title.is_empty(), target) {
            (true, None) => None,
            (true, Some(target)) => {
                Some(TocNode::new(href::file_name(&target.path).to_string(), Some(target)))
            }
            (false, target) => Some(TocNode::new(title, target)),
        }
    }
}

fn epub_type<'a>(node: &Node<'a, '_>) -> &'a str {
    node.attributes()
        .find(|a| a.name() == "type")
        .map(|a| a.value())
        .unwrap_or("")
}

/// Entries of the `toc` nav of an EPUB 3 navigation document
pub fn parse_nav_document(
    doc_path: &str,
    text: &str,
    structure: &BookStructure,
    exists: EntryCheck,
) -> Result<Vec<TocNode>, roxmltree::Error> {
    let text = xml::numeric_entities(text);
    let doc = xml::parse(&text)?;
    let navs: Vec<Node> = doc.descendants().filter(|n| xml::is(n, "nav")).collect();
    let nav = navs
        .iter()
        .find(|n| epub_type(n).split_whitespace().any(|t| t == "toc"))
        .or_else(|| navs.first());

    let mut entries = Vec::new();
    let Some(list) = nav.and_then(|n| n.descendants().find(|d| xml::is(d, "ol"))) else {
        return Ok(entries);
    };

    let targets = Targets {
        doc_path,
        structure,
        exists,
    };
    nav_list(list, 1, &targets, &mut entries);
    Ok(entries)
}

fn nav_item(li: Node, targets: &Targets) -> Option<TocNode> {
    let label = li.children().find(|n| xml::is(n, "a") || xml::is(n, "span"));
    let title = label.map(xml::text_content).unwrap_or_default();
    let target = label
        .filter(|n| xml::is(n, "a"))
        .and_then(|a| targets.resolve(a.attribute("href")));
    targets.node(title, target)
}

fn nav_list(list: Node, depth: usize, targets: &Targets, out: &mut Vec<TocNode>) {
    for li in list.children().filter(|n| xml::is(n, "li")) {
        let sublist = li.children().find(|n| xml::is(n, "ol"));
        let node = nav_item(li, targets);

        match (node, sublist) {
            (Some(node), None) => out.push(node),
            (Some(mut node), Some(sublist)) if depth < MAX_TOC_DEPTH => {
                nav_list(sublist, depth + 1, targets, &mut node.children);
                out.push(node);
            }
            (Some(node), Some(sublist)) => {
                out.push(node);
                flatten_nav(sublist, targets, out);
            }
            // unlabeled entry: its children take its place
            (None, Some(sublist)) if depth < MAX_TOC_DEPTH => nav_list(sublist, depth + 1, targets, out),
            (None, Some(sublist)) => flatten_nav(sublist, targets, out),
            (None, None) => {}
        }
    }
}

fn flatten_nav(list: Node, targets: &Targets, out: &mut Vec<TocNode>) {
    out.extend(
        list.descendants()
            .filter(|n| xml::is(n, "li"))
            .filter_map(|li| nav_item(li, targets)),
    );
}

/// Entries of the `navMap` of an NCX document
pub fn parse_ncx_document(
    doc_path: &str,
    text: &str,
    structure: &BookStructure,
    exists: EntryCheck,
) -> Result<Vec<TocNode>, roxmltree::Error> {
    let text = xml::numeric_entities(text);
    let doc = xml::parse(&text)?;
    let mut entries = Vec::new();
    let Some(nav_map) = doc.descendants().find(|n| xml::is(n, "navMap")) else {
        return Ok(entries);
    };

    let targets = Targets {
        doc_path,
        structure,
        exists,
    };
    nav_points(nav_map, 1, &targets, &mut entries);
    Ok(entries)
}

fn nav_point(point: Node, targets: &Targets) -> Option<TocNode> {
    let title = xml::child(point, "navLabel")
        .and_then(|label| xml::child(label, "text"))
        .map(xml::text_content)
        .unwrap_or_default();
    let target = xml::child(point, "content").and_then(|c| targets.resolve(c.attribute("src")));
    targets.node(title, target)
}

fn nav_points(parent: Node, depth: usize, targets: &Targets, out: &mut Vec<TocNode>) {
    for point in parent.children().filter(|n| xml::is(n, "navPoint")) {
        let nested = point.children().any(|n| xml::is(&n, "navPoint"));
        let node = nav_point(point, targets);

        match (node, nested) {
            (Some(node), false) => out.push(node),
            (Some(mut node), true) if depth < MAX_TOC_DEPTH => {
                nav_points(point, depth + 1, targets, &mut node.children);
                out.push(node);
            }
            (Some(node), true) => {
                out.push(node);
                flatten_ncx(point, targets, out);
            }
            (None, true) if depth < MAX_TOC_DEPTH => nav_points(point, depth + 1, targets, out),
            (None, true) => flatten_ncx(point, targets, out),
            (None, false) => {}
        }
    }
}

fn flatten_ncx(point: Node, targets: &Targets, out: &mut Vec<TocNode>) {
    out.extend(
        point
            .descendants()
            .skip(1)
            .filter(|n| xml::is(n, "navPoint"))
            .filter_map(|p| nav_point(p, targets)),
    );
}
