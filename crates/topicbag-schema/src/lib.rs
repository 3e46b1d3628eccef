//! Schema Import and Descriptor-Set Materialization
//!
//! Topics carry payloads described by Protobuf schemas. To make recorded
//! logs self-describing, the recorder embeds, per registered type, the
//! serialized transitive closure of that type's file descriptors: everything
//! a reader needs to reconstruct the type without the original source tree.
//!
//! Schema *compilation* (turning `.proto` source into descriptors) is an
//! external concern behind the [`SchemaImporter`] trait. The bundled
//! [`DescriptorSetImporter`] consumes compiled descriptor-set files
//! (`protoc --descriptor_set_out --include_imports`) found on the configured
//! search paths. [`SchemaRegistry`] sits on top, resolving fully-qualified
//! type names and materializing deduplicated descriptor-set blobs.

pub mod error;
pub mod importer;
pub mod registry;

pub use error::{Result, SchemaError};
pub use importer::{DescriptorSetImporter, SchemaImporter};
pub use registry::SchemaRegistry;
