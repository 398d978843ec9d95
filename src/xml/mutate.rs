use super::document::{Element, XmlDocument};
use super::{describe_path, Tag, XmlError};
use std::fs;
use std::path::Path;

/// Parse a configuration file into a document.
pub fn load(path: &Path) -> Result<XmlDocument, XmlError> {
    let text = fs::read_to_string(path).map_err(|source| XmlError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    XmlDocument::parse(&text).map_err(|message| XmlError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Write `document` over `path`, keeping the original file's permissions.
pub fn save(path: &Path, document: &XmlDocument) -> Result<(), XmlError> {
    let text = document.render().map_err(|message| XmlError::Serialize {
        path: path.to_path_buf(),
        message,
    })?;
    let write_err = |source| XmlError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.xml");
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, text.as_bytes()).map_err(write_err)?;
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(&tmp_path, metadata.permissions()).map_err(write_err)?;
    }
    fs::rename(&tmp_path, path).map_err(write_err)?;
    Ok(())
}

/// Set (or add) `attribute` on the element at `node` and rewrite the file.
pub fn set_attribute(
    path: &Path,
    node: &[Tag],
    attribute: &str,
    value: &str,
) -> Result<(), XmlError> {
    let mut document = load(path)?;
    let element = document
        .find_mut(node)
        .ok_or_else(|| XmlError::MissingNode {
            path: path.to_path_buf(),
            location: describe_path(node),
        })?;
    element.set_attribute(attribute, value);
    save(path, &document)
}

/// Replace every `tag` child of the element at `container` with
/// `replacements` and rewrite the file.
///
/// This is a full replace, not a merge. Returns how many children were removed.
pub fn replace_children(
    path: &Path,
    container: &[Tag],
    tag: Tag,
    replacements: Vec<Element>,
) -> Result<usize, XmlError> {
    let mut document = load(path)?;
    let element = document
        .find_mut(container)
        .ok_or_else(|| XmlError::MissingNode {
            path: path.to_path_buf(),
            location: describe_path(container),
        })?;
    let removed = replace_matching(element, &tag, replacements);
    save(path, &document)?;
    Ok(removed)
}

pub(super) fn replace_matching(
    container: &mut Element,
    tag: &Tag,
    replacements: Vec<Element>,
) -> usize {
    let indent = container.child_indent();
    let removed = container.remove_children(tag);

    // The prefix to write replacements with, and whether they must declare it
    // themselves. `None` means the namespace is the default one.
    let binding: Option<(Option<String>, bool)> = match tag.namespace {
        Some(namespace) if container.namespace() == Some(namespace) => {
            Some((container.prefix().map(str::to_string), false))
        }
        // A declaration carried by a removed child leaves with it.
        Some(namespace) => removed.first().map(|existing| {
            let prefix = existing.prefix().map(str::to_string);
            let declared_here =
                existing.attribute(&declaration_name(prefix.as_deref())).as_deref()
                    == Some(namespace);
            (prefix, declared_here)
        }),
        None => Some((None, false)),
    };

    for mut child in replacements {
        if let Some(namespace) = tag.namespace {
            let (prefix, declare) = match &binding {
                Some((prefix, declare)) => (prefix.as_deref(), *declare),
                None => (None, true),
            };
            child.qualify(namespace, prefix);
            if declare {
                child.set_attribute(&declaration_name(prefix), namespace);
            }
        }
        container.append_child(child, indent.as_deref());
    }
    removed.len()
}

fn declaration_name(prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => format!("xmlns:{prefix}"),
        None => "xmlns".to_string(),
    }
}

#[cfg(test)]
#[path = "mutate_tests.rs"]
mod tests;
