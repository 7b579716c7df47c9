//! Per-entity-type indexing descriptors
//!
//! A descriptor names the properties that feed the index, the properties
//! that reference binary content, and the optional rules that decide which
//! instances are searchable.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::store::EntitySnapshot;

/// Decides whether one instance should be indexed. Must be side-effect free.
pub type SearchablePredicate = Arc<dyn Fn(&EntitySnapshot) -> bool + Send + Sync>;

/// Post-filter over the candidates produced for a changed entity.
///
/// Receives the changed entity and the candidate list, returns the list of
/// entities to enqueue. May drop candidates or add related entities.
pub type SearchablesHook =
    Arc<dyn Fn(&EntitySnapshot, Vec<EntitySnapshot>) -> Vec<EntitySnapshot> + Send + Sync>;

/// Indexing descriptor of one entity type, immutable once loaded
#[derive(Clone)]
pub struct EntityDescr {
    name: String,
    properties: BTreeSet<String>,
    content_properties: BTreeSet<String>,
    searchable_if: Option<SearchablePredicate>,
    searchables: Option<SearchablesHook>,
    show: bool,
}

impl EntityDescr {
    /// Start a descriptor for `name`, shown in results by default
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntityDescrBuilder {
        EntityDescrBuilder {
            descr: EntityDescr {
                name: name.into(),
                properties: BTreeSet::new(),
                content_properties: BTreeSet::new(),
                searchable_if: None,
                searchables: None,
                show: true,
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Searchable property paths (dotted for nested values)
    #[must_use]
    pub fn properties(&self) -> &BTreeSet<String> {
        &self.properties
    }

    /// Properties holding references to binary content
    #[must_use]
    pub fn content_properties(&self) -> &BTreeSet<String> {
        &self.content_properties
    }

    #[must_use]
    pub fn searchable_if(&self) -> Option<&SearchablePredicate> {
        self.searchable_if.as_ref()
    }

    #[must_use]
    pub fn searchables(&self) -> Option<&SearchablesHook> {
        self.searchables.as_ref()
    }

    /// Whether results of this type are displayed. Has no effect on indexing.
    #[must_use]
    pub fn show(&self) -> bool {
        self.show
    }

    /// Whether `property` is the root of any searchable or content path
    #[must_use]
    pub fn owns_property(&self, property: &str) -> bool {
        self.properties
            .iter()
            .chain(self.content_properties.iter())
            .any(|path| path.split('.').next() == Some(property))
    }
}

impl fmt::Debug for EntityDescr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescr")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("content_properties", &self.content_properties)
            .field("searchable_if", &self.searchable_if.is_some())
            .field("searchables", &self.searchables.is_some())
            .field("show", &self.show)
            .finish()
    }
}

pub struct EntityDescrBuilder {
    descr: EntityDescr,
}

impl EntityDescrBuilder {
    #[must_use]
    pub fn property(mut self, path: impl Into<String>) -> Self {
        self.descr.properties.insert(path.into());
        self
    }

    #[must_use]
    pub fn properties<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descr.properties.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Declare a property whose value references binary content to index
    #[must_use]
    pub fn content_property(mut self, path: impl Into<String>) -> Self {
        self.descr.content_properties.insert(path.into());
        self
    }

    #[must_use]
    pub fn searchable_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EntitySnapshot) -> bool + Send + Sync + 'static,
    {
        self.descr.searchable_if = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub fn searchables<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EntitySnapshot, Vec<EntitySnapshot>) -> Vec<EntitySnapshot> + Send + Sync + 'static,
    {
        self.descr.searchables = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn show(mut self, show: bool) -> Self {
        self.descr.show = show;
        self
    }

    #[must_use]
    pub fn build(self) -> EntityDescr {
        self.descr
    }
}
