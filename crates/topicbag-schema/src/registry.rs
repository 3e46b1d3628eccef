//! Schema Registry
//!
//! Resolves configured topic types to descriptors and materializes the
//! serialized descriptor-set blobs embedded in recorded logs.
//!
//! ## Transitive closure
//!
//! The blob for a type is the breadth-first walk over its root file's
//! dependency graph: each reachable file descriptor is copied into a
//! `FileDescriptorSet` exactly once, deduplicated by file name (names are
//! the stable identity in the descriptor system; contents are not hashed).
//!
//! Blobs are cached keyed by type name so file rotation can re-register
//! schemas without re-running imports.

use crate::error::{Result, SchemaError};
use crate::importer::SchemaImporter;
use bytes::Bytes;
use prost::Message as _;
use prost_types::FileDescriptorSet;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

pub struct SchemaRegistry {
    importer: Box<dyn SchemaImporter>,
    /// Materialized blobs keyed by fully-qualified type name
    blobs: HashMap<String, Bytes>,
}

impl SchemaRegistry {
    pub fn new(importer: Box<dyn SchemaImporter>) -> Self {
        Self {
            importer,
            blobs: HashMap::new(),
        }
    }

    /// Import a schema source file through the underlying importer.
    pub fn register(&mut self, source_file: &str) -> Result<()> {
        self.importer.import(source_file)
    }

    /// Serialized transitive-closure descriptor set for a fully-qualified
    /// type name. Cached per type.
    pub fn descriptor_set_for(&mut self, fqname: &str) -> Result<Bytes> {
        if let Some(blob) = self.blobs.get(fqname) {
            return Ok(blob.clone());
        }

        let root = self
            .importer
            .file_for_type(fqname)
            .ok_or_else(|| SchemaError::TypeNotFound(fqname.to_string()))?
            .to_string();

        let mut set = FileDescriptorSet::default();
        let mut pending = VecDeque::from([root.clone()]);
        let mut seen: HashSet<String> = HashSet::from([root]);

        while let Some(name) = pending.pop_front() {
            let file = self.importer.file(&name).ok_or_else(|| {
                SchemaError::MissingDependency {
                    file: fqname.to_string(),
                    dependency: name.clone(),
                }
            })?;
            set.file.push(file.clone());

            for dependency in &file.dependency {
                if seen.insert(dependency.clone()) {
                    pending.push_back(dependency.clone());
                }
            }
        }

        debug!(
            type_name = fqname,
            files = set.file.len(),
            "materialized descriptor set"
        );

        let blob = Bytes::from(set.encode_to_vec());
        self.blobs.insert(fqname.to_string(), blob.clone());
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::{DescriptorProto, FileDescriptorProto};

    /// In-memory importer for registry tests; no disk involved.
    #[derive(Default)]
    struct MapImporter {
        files: HashMap<String, FileDescriptorProto>,
        types: HashMap<String, String>,
    }

    impl MapImporter {
        fn with_file(mut self, name: &str, deps: &[&str], types: &[&str]) -> Self {
            self.files.insert(
                name.to_string(),
                FileDescriptorProto {
                    name: Some(name.to_string()),
                    dependency: deps.iter().map(|d| d.to_string()).collect(),
                    message_type: types
                        .iter()
                        .map(|t| DescriptorProto {
                            name: Some(t.to_string()),
                            ..Default::default()
                        })
                        .collect(),
                    ..Default::default()
                },
            );
            for t in types {
                self.types.insert(t.to_string(), name.to_string());
            }
            self
        }
    }

    impl SchemaImporter for MapImporter {
        fn import(&mut self, _source_file: &str) -> Result<()> {
            Ok(())
        }
        fn file(&self, name: &str) -> Option<&FileDescriptorProto> {
            self.files.get(name)
        }
        fn file_for_type(&self, fqname: &str) -> Option<&str> {
            self.types.get(fqname).map(String::as_str)
        }
    }

    fn decode(blob: &Bytes) -> FileDescriptorSet {
        FileDescriptorSet::decode(blob.as_ref()).expect("decode blob")
    }

    #[test]
    fn test_closure_single_file() {
        let importer = MapImporter::default().with_file("a.proto", &[], &["A"]);
        let mut registry = SchemaRegistry::new(Box::new(importer));

        let blob = registry.descriptor_set_for("A").unwrap();
        let set = decode(&blob);
        assert_eq!(set.file.len(), 1);
        assert_eq!(set.file[0].name(), "a.proto");
    }

    #[test]
    fn test_closure_follows_dependency_chain() {
        let importer = MapImporter::default()
            .with_file("a.proto", &["b.proto"], &["A"])
            .with_file("b.proto", &["c.proto"], &["B"])
            .with_file("c.proto", &[], &["C"]);
        let mut registry = SchemaRegistry::new(Box::new(importer));

        let set = decode(&registry.descriptor_set_for("A").unwrap());
        let names: Vec<&str> = set.file.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a.proto", "b.proto", "c.proto"]);
    }

    #[test]
    fn test_closure_deduplicates_diamond() {
        // a -> b, a -> c, b -> d, c -> d: d must appear exactly once
        let importer = MapImporter::default()
            .with_file("a.proto", &["b.proto", "c.proto"], &["A"])
            .with_file("b.proto", &["d.proto"], &["B"])
            .with_file("c.proto", &["d.proto"], &["C"])
            .with_file("d.proto", &[], &["D"]);
        let mut registry = SchemaRegistry::new(Box::new(importer));

        let set = decode(&registry.descriptor_set_for("A").unwrap());
        assert_eq!(set.file.len(), 4);
        let d_count = set.file.iter().filter(|f| f.name() == "d.proto").count();
        assert_eq!(d_count, 1);
    }

    #[test]
    fn test_closure_is_breadth_first() {
        let importer = MapImporter::default()
            .with_file("root.proto", &["x.proto", "y.proto"], &["Root"])
            .with_file("x.proto", &["deep.proto"], &["X"])
            .with_file("y.proto", &[], &["Y"])
            .with_file("deep.proto", &[], &["Deep"]);
        let mut registry = SchemaRegistry::new(Box::new(importer));

        let set = decode(&registry.descriptor_set_for("Root").unwrap());
        let names: Vec<&str> = set.file.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["root.proto", "x.proto", "y.proto", "deep.proto"]);
    }

    #[test]
    fn test_unknown_type_errors() {
        let importer = MapImporter::default().with_file("a.proto", &[], &["A"]);
        let mut registry = SchemaRegistry::new(Box::new(importer));
        let err = registry.descriptor_set_for("Nope").unwrap_err();
        assert!(matches!(err, SchemaError::TypeNotFound(_)));
    }

    #[test]
    fn test_missing_dependency_errors() {
        let importer = MapImporter::default().with_file("a.proto", &["gone.proto"], &["A"]);
        let mut registry = SchemaRegistry::new(Box::new(importer));
        let err = registry.descriptor_set_for("A").unwrap_err();
        assert!(matches!(err, SchemaError::MissingDependency { .. }));
    }

    #[test]
    fn test_blob_is_cached() {
        let importer = MapImporter::default().with_file("a.proto", &[], &["A"]);
        let mut registry = SchemaRegistry::new(Box::new(importer));

        let first = registry.descriptor_set_for("A").unwrap();
        let second = registry.descriptor_set_for("A").unwrap();
        assert_eq!(first, second);
        // Bytes clones share the same backing storage when served from cache
        assert_eq!(first.as_ptr(), second.as_ptr());
    }
}
