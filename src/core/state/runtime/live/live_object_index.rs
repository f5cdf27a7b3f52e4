use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::state::runtime::live::resource_kind::ResourceKind;
use crate::core::state::runtime::live::tracked_object::{ObjectKey, TrackedObject};

#[derive(Debug, Clone)]
pub struct IndexedObject {
    pub object: Arc<TrackedObject>,
    /// Index revision at which this object was last written.
    pub revision: u64,
}

/// Ordered in-memory view of every watched object.
///
/// Keys sort by kind first, so one kind's objects form a contiguous range.
#[derive(Debug, Default)]
pub struct LiveObjectIndex {
    objects: BTreeMap<ObjectKey, IndexedObject>,
    revision: u64,
}

impl LiveObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts one object and returns the new revision.
    pub fn apply(&mut self, object: TrackedObject) -> u64 {
        self.revision += 1;
        self.objects.insert(
            object.key(),
            IndexedObject {
                object: Arc::new(object),
                revision: self.revision,
            },
        );
        self.revision
    }

    /// Removes one object. Returns the new revision, or `None` when the key
    /// was not present.
    pub fn remove(&mut self, key: &ObjectKey) -> Option<u64> {
        self.objects.remove(key)?;
        self.revision += 1;
        Some(self.revision)
    }

    /// Swaps every object of `kind` for `objects` in one step.
    pub fn replace_kind(&mut self, kind: ResourceKind, objects: Vec<TrackedObject>) -> u64 {
        self.revision += 1;
        let revision = self.revision;
        self.objects.retain(|key, _| key.kind != kind);
        for object in objects.into_iter().filter(|o| o.kind() == kind) {
            self.objects.insert(
                object.key(),
                IndexedObject {
                    object: Arc::new(object),
                    revision,
                },
            );
        }
        revision
    }

    /// Objects of `kind` in key order, optionally limited to one namespace.
    pub fn objects_of(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Vec<Arc<TrackedObject>> {
        self.objects
            .range(ObjectKey::first_of(kind)..)
            .take_while(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.map_or(true, |ns| key.namespace == ns))
            .map(|(_, indexed)| indexed.object.clone())
            .collect()
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.objects
            .range(ObjectKey::first_of(kind)..)
            .take_while(|(key, _)| key.kind == kind)
            .count()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&IndexedObject> {
        self.objects.get(key)
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
