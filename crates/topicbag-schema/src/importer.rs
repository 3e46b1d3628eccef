//! Schema Importers
//!
//! The [`SchemaImporter`] trait abstracts where file descriptors come from.
//! The recorder only needs two lookups after an import: file name to
//! descriptor, and fully-qualified type name to owning file.

use crate::error::{Result, SchemaError};
use prost::Message as _;
use prost_types::{DescriptorProto, FileDescriptorProto, FileDescriptorSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of Protobuf file descriptors.
pub trait SchemaImporter: Send + Sync {
    /// Import a named schema source file, making its descriptors (and those
    /// of its transitive imports) available for lookup.
    fn import(&mut self, source_file: &str) -> Result<()>;

    /// Look up an imported file descriptor by file name.
    fn file(&self, name: &str) -> Option<&FileDescriptorProto>;

    /// Resolve a fully-qualified message type name to its owning file name.
    fn file_for_type(&self, fqname: &str) -> Option<&str>;
}

/// Importer over compiled descriptor-set files.
///
/// For a configured source file `sensors.proto`, the importer looks on each
/// search path for the compiled set produced by
/// `protoc --descriptor_set_out --include_imports`: first the literal name,
/// then the conventional `sensors.binpb` / `sensors.desc` / `sensors.pb`
/// spellings. Every file descriptor contained in the set is indexed.
pub struct DescriptorSetImporter {
    search_paths: Vec<PathBuf>,
    /// Imported descriptors, keyed by descriptor file name
    files: HashMap<String, FileDescriptorProto>,
    /// Fully-qualified message type name to owning file name
    types: HashMap<String, String>,
    /// Source files already imported, to skip repeat disk reads
    imported: Vec<String>,
}

const COMPILED_EXTENSIONS: [&str; 3] = ["binpb", "desc", "pb"];

impl DescriptorSetImporter {
    pub fn new(search_paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
            files: HashMap::new(),
            types: HashMap::new(),
            imported: Vec::new(),
        }
    }

    fn locate(&self, source_file: &str) -> Option<PathBuf> {
        for base in &self.search_paths {
            let literal = base.join(source_file);
            if literal.is_file() {
                return Some(literal);
            }
            let stem = Path::new(source_file).with_extension("");
            for ext in COMPILED_EXTENSIONS {
                let candidate = base.join(stem.with_extension(ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn index_file(&mut self, file: FileDescriptorProto) {
        let file_name = file.name().to_string();
        let package = file.package().to_string();
        for message in &file.message_type {
            Self::index_message(&mut self.types, &file_name, &package, message);
        }
        self.files.insert(file_name, file);
    }

    fn index_message(
        types: &mut HashMap<String, String>,
        file_name: &str,
        prefix: &str,
        message: &DescriptorProto,
    ) {
        let fqname = if prefix.is_empty() {
            message.name().to_string()
        } else {
            format!("{}.{}", prefix, message.name())
        };
        for nested in &message.nested_type {
            Self::index_message(types, file_name, &fqname, nested);
        }
        types.insert(fqname, file_name.to_string());
    }
}

impl SchemaImporter for DescriptorSetImporter {
    fn import(&mut self, source_file: &str) -> Result<()> {
        if self.imported.iter().any(|f| f == source_file) {
            return Ok(());
        }

        let path = self
            .locate(source_file)
            .ok_or_else(|| SchemaError::FileNotFound(source_file.to_string()))?;
        let bytes = std::fs::read(&path)?;
        let set = FileDescriptorSet::decode(bytes.as_slice()).map_err(|source| {
            SchemaError::Decode {
                file: source_file.to_string(),
                source,
            }
        })?;

        if set.file.is_empty() {
            warn!(source_file, path = %path.display(), "descriptor set contains no files");
        }
        debug!(
            source_file,
            path = %path.display(),
            files = set.file.len(),
            "imported descriptor set"
        );

        for file in set.file {
            self.index_file(file);
        }
        self.imported.push(source_file.to_string());
        Ok(())
    }

    fn file(&self, name: &str) -> Option<&FileDescriptorProto> {
        self.files.get(name)
    }

    fn file_for_type(&self, fqname: &str) -> Option<&str> {
        self.types.get(fqname).map(String::as_str)
    }
}
