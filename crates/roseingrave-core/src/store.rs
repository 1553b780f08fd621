//! Named-document persistence.
//!
//! Collections keyed by volunteer email or piece title are stored one file
//! per identifier. A [`PathTemplate`] such as `volunteers/{email}.json`
//! resolves an identifier to its file and discovers the existing files by
//! matching the placeholder against directory entries.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("path \"{path}\" must contain {placeholder} exactly once")]
    Placeholder {
        path: String,
        placeholder: Placeholder,
    },
    #[error("path \"{path}\" must end in .json")]
    NotJson { path: String },
    #[error("file not found: {path}")]
    NotFound { path: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Placeholder { .. } | Self::NotJson { .. } => ErrorCode::PlaceholderInvalid,
            Self::NotFound { .. } => ErrorCode::FileNotFound,
            Self::Read { .. } => ErrorCode::FileReadFailed,
            Self::Write { .. } => ErrorCode::FileWriteFailed,
            Self::Parse { .. } => ErrorCode::JsonParseFailed,
        }
    }
}

/// Identifier kind substituted into a path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Email,
    Piece,
}

impl Placeholder {
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Email => "{email}",
            Self::Piece => "{piece}",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Read and parse a JSON file.
///
/// # Errors
///
/// Fails when the file is missing, unreadable, or not valid JSON.
pub fn read_json(path: &Path) -> Result<Value, StoreError> {
    debug!(path = %path.display(), "reading");
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: display(path),
            }
        } else {
            StoreError::Read {
                path: display(path),
                source,
            }
        }
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: display(path),
        source,
    })
}

/// Write a value as 2-space indented JSON, creating parent directories.
///
/// # Errors
///
/// Fails when a directory cannot be created or the file cannot be written.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: display(path),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }
    let mut content = serde_json::to_string_pretty(value)
        .map_err(|source| write_err(io::Error::new(io::ErrorKind::InvalidData, source)))?;
    content.push('\n');
    fs::write(path, content).map_err(write_err)?;
    debug!(path = %path.display(), "wrote");
    Ok(())
}

/// Check that a settings path names a JSON file.
///
/// # Errors
///
/// Returns [`StoreError::NotJson`] otherwise.
pub fn require_json(path: &str) -> Result<(), StoreError> {
    if Path::new(path).extension().is_some_and(|ext| ext == "json") {
        Ok(())
    } else {
        Err(StoreError::NotJson {
            path: path.to_string(),
        })
    }
}

/// A file path with one `{email}` or `{piece}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    placeholder: Placeholder,
}

impl PathTemplate {
    /// # Errors
    ///
    /// Fails unless the placeholder occurs exactly once and the path ends
    /// in `.json`.
    pub fn new(raw: impl Into<String>, placeholder: Placeholder) -> Result<Self, StoreError> {
        let raw = raw.into();
        if raw.matches(placeholder.token()).count() != 1 {
            return Err(StoreError::Placeholder {
                path: raw,
                placeholder,
            });
        }
        require_json(&raw)?;
        Ok(Self { raw, placeholder })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub const fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    /// Path of the file for `id`.
    #[must_use]
    pub fn resolve(&self, id: &str) -> PathBuf {
        PathBuf::from(self.raw.replacen(self.placeholder.token(), id, 1))
    }

    /// Existing files matching the template, keyed by identifier and sorted.
    ///
    /// The placeholder must lie within a single path component; a missing
    /// directory yields no files.
    ///
    /// # Errors
    ///
    /// Fails when the directory holding the placeholder cannot be listed.
    pub fn discover(&self) -> Result<IndexMap<String, PathBuf>, StoreError> {
        let token = self.placeholder.token();
        let mut base = PathBuf::new();
        let mut pattern: Option<(&str, &str)> = None;
        let mut rest = PathBuf::new();
        for component in Path::new(&self.raw).components() {
            let text = component.as_os_str().to_str().unwrap_or_default();
            if pattern.is_some() {
                rest.push(component);
            } else if matches!(component, Component::Normal(_)) && text.contains(token) {
                pattern = text.split_once(token);
            } else {
                base.push(component);
            }
        }
        let Some((prefix, suffix)) = pattern else {
            return Ok(IndexMap::new());
        };
        let dir = if base.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            base
        };
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "directory not found; nothing to discover");
            return Ok(IndexMap::new());
        }

        let read_err = |source| StoreError::Read {
            path: display(&dir),
            source,
        };
        let mut found = Vec::new();
        for entry in fs::read_dir(&dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|name| name.strip_prefix(prefix))
                .and_then(|name| name.strip_suffix(suffix))
                .filter(|id| !id.is_empty())
            else {
                continue;
            };
            let path = entry.path().join(&rest);
            if path.is_file() {
                found.push((id.to_string(), path));
            }
        }
        found.sort();
        Ok(found.into_iter().collect())
    }

    /// Read every discovered file.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be read or parsed.
    pub fn read_all(&self) -> Result<IndexMap<String, Value>, StoreError> {
        let files = self.discover()?;
        info!(template = %self.raw, count = files.len(), "reading documents");
        files
            .into_iter()
            .map(|(id, path)| read_json(&path).map(|doc| (id, doc)))
            .collect()
    }

    /// Write each document to the file for its identifier.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be written.
    pub fn write_all<'a, T, I>(&self, documents: I) -> Result<Vec<PathBuf>, StoreError>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = (&'a str, &'a T)>,
    {
        let mut written = Vec::new();
        for (id, document) in documents {
            let path = self.resolve(id);
            write_json(&path, document)?;
            written.push(path);
        }
        info!(template = %self.raw, count = written.len(), "wrote documents");
        Ok(written)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn template_in(dir: &TempDir, rel: &str, placeholder: Placeholder) -> PathTemplate {
        let raw = dir.path().join(rel).display().to_string();
        PathTemplate::new(raw, placeholder).unwrap()
    }

    #[test]
    fn placeholder_must_occur_once() {
        assert!(PathTemplate::new("data/{email}.json", Placeholder::Email).is_ok());
        for bad in ["data/x.json", "{email}/{email}.json", "data/{piece}.json"] {
            let err = PathTemplate::new(bad, Placeholder::Email).unwrap_err();
            assert_eq!(err.code(), ErrorCode::PlaceholderInvalid);
        }
        assert!(matches!(
            PathTemplate::new("data/{email}.txt", Placeholder::Email),
            Err(StoreError::NotJson { .. })
        ));
    }

    #[test]
    fn resolve_substitutes_identifier() {
        let t = PathTemplate::new("out/{piece}.json", Placeholder::Piece).unwrap();
        assert_eq!(t.resolve("Sonata"), PathBuf::from("out/Sonata.json"));
    }

    #[test]
    fn write_then_discover_sorted() {
        let dir = TempDir::new().unwrap();
        let t = template_in(&dir, "vols/data-{email}.json", Placeholder::Email);
        let docs = [("b@x", json!([1])), ("a@x", json!([2]))];
        t.write_all(docs.iter().map(|(id, doc)| (*id, doc))).unwrap();
        std::fs::write(dir.path().join("vols/other.json"), "{}").unwrap();

        let found = t.read_all().unwrap();
        let ids: Vec<&String> = found.keys().collect();
        assert_eq!(ids, ["a@x", "b@x"]);
        assert_eq!(found["a@x"], json!([2]));
        let text = std::fs::read_to_string(t.resolve("a@x")).unwrap();
        assert_eq!(text, "[\n  2\n]\n");
    }

    #[test]
    fn placeholder_in_directory_component() {
        let dir = TempDir::new().unwrap();
        let t = template_in(&dir, "{piece}/data.json", Placeholder::Piece);
        write_json(&t.resolve("P"), &json!({})).unwrap();
        std::fs::create_dir_all(dir.path().join("Q")).unwrap();
        let found = t.discover().unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("P"));
    }

    #[test]
    fn missing_directory_discovers_nothing() {
        let dir = TempDir::new().unwrap();
        let t = template_in(&dir, "nope/{email}.json", Placeholder::Email);
        assert!(t.discover().unwrap().is_empty());
    }

    #[test]
    fn read_errors_are_classified() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(read_json(&missing).unwrap_err().code(), ErrorCode::FileNotFound);
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert_eq!(read_json(&bad).unwrap_err().code(), ErrorCode::JsonParseFailed);
    }
}
