use crate::model::{Connection, ConnectionPatch, Profile, ProfileField};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A record that can live in an [`EntityTable`]
pub trait Entity: Clone {
    /// Field-level update the record accepts
    type Patch;

    fn entity_id(&self) -> &str;

    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Order of the table's id list. Defaults to "no defined order".
    fn list_order(_a: &Self, _b: &Self) -> Ordering {
        Ordering::Equal
    }
}

impl Entity for Connection {
    type Patch = ConnectionPatch;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &ConnectionPatch) {
        match patch {
            ConnectionPatch::Status { status, updated_at } => {
                self.status = *status;
                self.updated_at = *updated_at;
            }
            ConnectionPatch::Message(message) => self.message = message.clone(),
        }
    }

    /// Most recently created first; id breaks ties so the order is total.
    fn list_order(a: &Self, b: &Self) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl Entity for Profile {
    type Patch = ProfileField;

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &ProfileField) {
        self.apply_field(patch);
    }
}

/// Normalized collection: an id-keyed map plus an ordered id list.
///
/// Invariant: `ids` and `by_id` always hold exactly the same set of ids, and
/// `ids` has no duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTable<E> {
    ids: Vec<String>,
    by_id: HashMap<String, E>,
}

impl<E> Default for EntityTable<E> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            by_id: HashMap::new(),
        }
    }
}

impl<E: Entity> EntityTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection, sorted by the entity's list order.
    ///
    /// Later duplicates of an id win.
    pub fn upsert_many(&mut self, records: impl IntoIterator<Item = E>) {
        self.by_id.clear();
        for record in records {
            self.by_id.insert(record.entity_id().to_string(), record);
        }

        let mut sorted: Vec<&E> = self.by_id.values().collect();
        sorted.sort_by(|a, b| E::list_order(a, b));
        self.ids = sorted
            .into_iter()
            .map(|record| record.entity_id().to_string())
            .collect();
    }

    /// Insert or replace one record. New ids go to the front of the list.
    pub fn upsert_one(&mut self, record: E) {
        let id = record.entity_id().to_string();
        if self.by_id.insert(id.clone(), record).is_none() {
            self.ids.insert(0, id);
        }
    }

    /// Shallow-merge `patch` into the record. Returns false if the id is absent.
    pub fn patch(&mut self, id: &str, patch: &E::Patch) -> bool {
        match self.by_id.get_mut(id) {
            Some(record) => {
                record.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    /// Remove a record. Returns the removed record, if any.
    pub fn remove(&mut self, id: &str) -> Option<E> {
        let removed = self.by_id.remove(id)?;
        self.ids.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.by_id.clear();
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Records in list order
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.ids.iter().filter_map(|id| self.by_id.get(id))
    }

    /// The first record in list order
    pub fn first(&self) -> Option<&E> {
        self.iter().next()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Verify the list/map membership invariant
    pub fn is_consistent(&self) -> bool {
        if self.ids.len() != self.by_id.len() {
            return false;
        }
        let mut seen = std::collections::HashSet::with_capacity(self.ids.len());
        self.ids
            .iter()
            .all(|id| self.by_id.contains_key(id) && seen.insert(id.as_str()))
    }
}
