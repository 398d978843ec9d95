//! In-place editing of service configuration documents.
//!
//! Documents are loaded into a small element tree that keeps comments,
//! whitespace and declarations as they were read, so rewriting a file only
//! changes the elements and attributes that were edited.
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

mod document;
mod mutate;

pub use document::{Element, XmlDocument};
pub use mutate::{load, replace_children, set_attribute};

/// Namespace-qualified element name used to walk a fixed document layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub namespace: Option<&'static str>,
    pub local: &'static str,
}

impl Tag {
    pub const fn plain(local: &'static str) -> Self {
        Self {
            namespace: None,
            local,
        }
    }

    pub const fn ns(namespace: &'static str, local: &'static str) -> Self {
        Self {
            namespace: Some(namespace),
            local,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Some(namespace) => write!(f, "{{{namespace}}}{}", self.local),
            None => f.write_str(self.local),
        }
    }
}

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{path}: no element at {location}")]
    MissingNode { path: PathBuf, location: String },
    #[error("serialize {path}: {message}")]
    Serialize { path: PathBuf, message: String },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_path(tags: &[Tag]) -> String {
    if tags.is_empty() {
        return "<root>".to_string();
    }
    tags.iter()
        .map(Tag::to_string)
        .collect::<Vec<_>>()
        .join("/")
}
