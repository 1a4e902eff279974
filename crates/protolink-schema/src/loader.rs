//! Where the linker gets files it was not handed directly.
//!
//! The linker asks a [`Loader`] for every import it needs to follow. Loads are
//! memoized by the linker, so a loader is asked at most once per path.

use std::collections::BTreeMap;

use crate::descriptor::{descriptor_proto, DESCRIPTOR_PROTO};
use crate::element::ProtoFileElement;
use crate::error::LoadError;

pub trait Loader {
    fn load(&mut self, path: &str) -> Result<ProtoFileElement, LoadError>;
}

/// In-memory loader keyed by import path.
///
/// `google/protobuf/descriptor.proto` is always available: the built-in copy
/// is returned unless a file with that path was added explicitly.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: BTreeMap<String, ProtoFileElement>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(files: impl IntoIterator<Item = ProtoFileElement>) -> Self {
        let mut loader = Self::new();
        for file in files {
            loader.add(file);
        }
        loader
    }

    pub fn add(&mut self, file: ProtoFileElement) {
        self.files.insert(file.path().to_string(), file);
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl Loader for MemoryLoader {
    fn load(&mut self, path: &str) -> Result<ProtoFileElement, LoadError> {
        if let Some(file) = self.files.get(path) {
            return Ok(file.clone());
        }
        if path == DESCRIPTOR_PROTO {
            return Ok(descriptor_proto());
        }
        Err(LoadError::NotFound {
            path: path.to_string(),
        })
    }
}

/// Searches several roots in order. A path present under more than one root
/// is ambiguous.
#[derive(Debug, Clone, Default)]
pub struct RootedLoader {
    roots: Vec<(String, MemoryLoader)>,
}

impl RootedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, base: impl Into<String>, files: impl IntoIterator<Item = ProtoFileElement>) -> Self {
        let base = base.into();
        let files: Vec<ProtoFileElement> = files
            .into_iter()
            .map(|mut file| {
                file.location.base = base.clone();
                file
            })
            .collect();
        self.roots.push((base, MemoryLoader::with_files(files)));
        self
    }
}

impl Loader for RootedLoader {
    fn load(&mut self, path: &str) -> Result<ProtoFileElement, LoadError> {
        let mut found: Vec<(String, ProtoFileElement)> = self
            .roots
            .iter()
            .filter_map(|(base, files)| files.files.get(path).map(|f| (base.clone(), f.clone())))
            .collect();
        match found.len() {
            0 if path == DESCRIPTOR_PROTO => Ok(descriptor_proto()),
            0 => Err(LoadError::NotFound {
                path: path.to_string(),
            }),
            1 => Ok(found.remove(0).1),
            _ => Err(LoadError::Ambiguous {
                path: path.to_string(),
                candidates: found
                    .iter()
                    .map(|(base, _)| format!("{}/{path}", base.trim_end_matches('/')))
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_loader_falls_back_to_builtin_descriptor() {
        let mut loader = MemoryLoader::new();
        let descriptor = loader.load(DESCRIPTOR_PROTO).expect("descriptor");
        assert_eq!(descriptor.package_name.as_deref(), Some("google.protobuf"));
        assert_eq!(
            loader.load("missing.proto"),
            Err(LoadError::NotFound {
                path: "missing.proto".to_string()
            })
        );
    }

    #[test]
    fn rooted_loader_reports_ambiguity() {
        let mut loader = RootedLoader::new()
            .root("/one", vec![ProtoFileElement::new("a.proto")])
            .root("/two", vec![ProtoFileElement::new("a.proto"), ProtoFileElement::new("b.proto")]);
        assert_eq!(loader.load("b.proto").expect("b").location.base, "/two");
        let err = loader.load("a.proto").expect_err("ambiguous");
        assert_eq!(err.to_string(), "a.proto is ambiguous:\n  /one/a.proto\n  /two/a.proto");
    }
}
