//! Package document parsing
//!
//! Finds the package document through `META-INF/container.xml` and turns
//! its manifest and spine into a [`BookStructure`]. Manifest hrefs are
//! relative to the package document's directory, not the archive root.

use roxmltree::Node;

use super::archive::Archive;
use super::error::{EpubError, EpubResult};
use super::href;
use super::types::{BookMetadata, BookStructure, Chapter, Resource};
use super::xml;

const CONTAINER_PATH: &str = "META-INF/container.xml";
const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";
const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Read the container and package documents of an opened archive
pub fn parse_package(archive: &Archive) -> EpubResult<BookStructure> {
    let package_path = find_package_path(archive)?;

    let bytes = match archive.read_entry(&package_path, None) {
        Err(EpubError::EntryNotFound(_)) => {
            return Err(EpubError::MissingRootFile(format!(
                "package document {} is not in the archive",
                package_path
            )))
        }
        other => other?,
    };
    let text = xml::text(&bytes)
        .map_err(|e| EpubError::MalformedPackage(format!("package document is not UTF-8: {}", e)))?;

    let mut structure = parse_package_document(&package_path, text)?;
    for resource in &mut structure.resources {
        resource.len = archive
            .entry(&resource.path)
            .filter(|e| !e.is_dir)
            .map(|e| e.size);
        if resource.len.is_none() {
            tracing::debug!(path = %resource.path, "manifest item has no archive entry");
        }
    }

    Ok(structure)
}

/// Archive path of the package document named by container.xml
pub fn find_package_path(archive: &Archive) -> EpubResult<String> {
    let bytes = match archive.read_entry(CONTAINER_PATH, None) {
        Err(EpubError::EntryNotFound(_)) => {
            return Err(EpubError::MissingRootFile(format!("{} not found", CONTAINER_PATH)))
        }
        other => other?,
    };
    let text = xml::text(&bytes)
        .map_err(|_| EpubError::MissingRootFile(format!("{} is not UTF-8", CONTAINER_PATH)))?;
    let doc = xml::parse(text)
        .map_err(|e| EpubError::MissingRootFile(format!("{}: {}", CONTAINER_PATH, e)))?;

    let rootfiles: Vec<Node> = doc.descendants().filter(|n| xml::is(n, "rootfile")).collect();
    let rootfile = rootfiles
        .iter()
        .find(|n| n.attribute("media-type") == Some(PACKAGE_MEDIA_TYPE))
        .or_else(|| rootfiles.first())
        .ok_or_else(|| EpubError::MissingRootFile("no rootfile in container".to_string()))?;

    let full_path = rootfile
        .attribute("full-path")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| EpubError::MissingRootFile("rootfile without full-path".to_string()))?;

    href::join("", &href::decode(full_path))
        .filter(|p| !p.is_empty())
        .ok_or_else(|| EpubError::MissingRootFile(format!("invalid rootfile path {}", full_path)))
}

/// Parse the package document found at `package_path`
pub fn parse_package_document(package_path: &str, text: &str) -> EpubResult<BookStructure> {
    let doc = xml::parse(text).map_err(|e| EpubError::MalformedPackage(e.to_string()))?;
    let package = doc.root_element();
    if package.tag_name().name() != "package" {
        return Err(EpubError::MalformedPackage(format!(
            "root element is <{}>, expected <package>",
            package.tag_name().name()
        )));
    }

    let manifest = xml::child(package, "manifest")
        .ok_or_else(|| EpubError::MalformedPackage("missing <manifest>".to_string()))?;
    let spine = xml::child(package, "spine")
        .ok_or_else(|| EpubError::MalformedPackage("missing <spine>".to_string()))?;

    let mut structure = BookStructure {
        package_path: package_path.to_string(),
        metadata: parse_metadata(package),
        ..BookStructure::default()
    };

    parse_manifest(&mut structure, manifest);
    parse_spine(&mut structure, spine)?;

    structure.ncx = spine
        .attribute("toc")
        .and_then(|id| structure.by_id.get(id.trim()).copied())
        .or_else(|| {
            structure
                .resources
                .iter()
                .position(|r| r.media_type.as_deref() == Some(NCX_MEDIA_TYPE))
        });

    Ok(structure)
}

fn parse_metadata(package: Node) -> BookMetadata {
    let mut metadata = BookMetadata::default();
    let Some(node) = xml::child(package, "metadata") else {
        return metadata;
    };

    for el in node.descendants().filter(|n| n.is_element()) {
        let value = xml::text_content(el);
        if value.is_empty() {
            continue;
        }
        match el.tag_name().name() {
            "title" if metadata.title.is_none() => metadata.title = Some(value),
            "creator" => metadata.creators.push(value),
            "language" if metadata.language.is_none() => metadata.language = Some(value),
            "identifier" if metadata.identifier.is_none() => metadata.identifier = Some(value),
            _ => {}
        }
    }

    metadata
}

fn parse_manifest(structure: &mut BookStructure, manifest: Node) {
    let package_dir = href::parent_dir(&structure.package_path).to_string();

    for item in manifest.children().filter(|n| xml::is(n, "item")) {
        let (Some(id), Some(raw_href)) = (item.attribute("id"), item.attribute("href")) else {
            tracing::warn!("manifest item without id or href skipped");
            continue;
        };
        if structure.by_id.contains_key(id) {
            tracing::warn!(id, "duplicate manifest id, keeping the first");
            continue;
        }

        let (raw_path, _) = href::split_href(raw_href.trim());
        let Some(path) = href::join(&package_dir, &href::decode(raw_path)).filter(|p| !p.is_empty())
        else {
            tracing::warn!(id, href = raw_href, "manifest href leaves the archive, skipped");
            continue;
        };

        let properties: Vec<String> = item
            .attribute("properties")
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let media_type = item
            .attribute("media-type")
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let index = structure.resources.len();
        structure.by_id.insert(id.to_string(), index);
        structure.by_path.entry(path.clone()).or_insert(index);
        let resource = Resource {
            id: id.to_string(),
            path,
            media_type,
            properties,
            len: None,
        };
        if structure.nav.is_none() && resource.has_property("nav") {
            structure.nav = Some(index);
        }
        structure.resources.push(resource);
    }
}

fn parse_spine(structure: &mut BookStructure, spine: Node) -> EpubResult<()> {
    for itemref in spine.children().filter(|n| xml::is(n, "itemref")) {
        let idref = itemref
            .attribute("idref")
            .map(str::trim)
            .ok_or_else(|| EpubError::MalformedPackage("spine itemref without idref".to_string()))?;
        let resource = *structure.by_id.get(idref).ok_or_else(|| {
            EpubError::MalformedPackage(format!("spine item {} has no manifest entry", idref))
        })?;
        let linear = !itemref
            .attribute("linear")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("no"));

        let index = structure.chapters.len();
        structure.spine_by_resource.entry(resource).or_insert(index);
        structure.chapters.push(Chapter {
            index,
            resource,
            linear,
        });
    }
    Ok(())
}
