//! Indexing descriptors and searchability rules
//!
//! Descriptors come from a `SchemaProvider`, are loaded once, and are
//! shared read-only by the queue processor and the reindex coordinator.

pub mod descriptor;
pub mod evaluator;
pub mod provider;

pub use descriptor::{EntityDescr, EntityDescrBuilder, SearchablePredicate, SearchablesHook};
pub use evaluator::SearchabilityEvaluator;
pub use provider::{DescriptorMap, DescriptorRegistry, SchemaError, SchemaProvider, StaticSchemaProvider};
