//! Immutable per-domain snapshots

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::Domain;
use crate::records::DomainRecord;

/// Latest known state of one domain.
///
/// Replaced wholesale on every successful fetch, never mutated in place.
/// Cloning is cheap: the item list is shared.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<T> {
    domain: Domain,
    version: u64,
    refreshed_at: Option<DateTime<Utc>>,
    items: Arc<[T]>,
}

impl<T: DomainRecord> Snapshot<T> {
    /// Empty snapshot for `T`'s domain, as held before the first fetch.
    pub fn empty() -> Self {
        Self {
            domain: T::DOMAIN,
            version: 0,
            refreshed_at: None,
            items: Arc::from(Vec::new()),
        }
    }

    /// Snapshot holding `items` at `version`, stamped with the current time.
    pub fn new(version: u64, items: impl Into<Arc<[T]>>) -> Self {
        Self {
            domain: T::DOMAIN,
            version,
            refreshed_at: Some(Utc::now()),
            items: items.into(),
        }
    }
}

impl<T> Snapshot<T> {
    /// Domain the snapshot belongs to.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Version assigned by the store; 0 means never populated.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When the snapshot was produced.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Whether a fetch has ever populated this domain.
    pub fn is_populated(&self) -> bool {
        self.version > 0
    }

    /// Records in the snapshot.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate the records.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Whether two snapshots share the same item allocation.
    pub fn same_items(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl<T: DomainRecord> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> IntoIterator for &'a Snapshot<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Role, User};

    #[test]
    fn empty_snapshot_is_unpopulated() {
        let snapshot: Snapshot<User> = Snapshot::empty();
        assert_eq!(snapshot.domain(), Domain::Users);
        assert_eq!(snapshot.version(), 0);
        assert!(!snapshot.is_populated());
        assert!(snapshot.refreshed_at().is_none());
    }

    #[test]
    fn clones_share_items() {
        let snapshot = Snapshot::new(3, vec![User::new("u1", "Ada", Role::Student)]);
        let copy = snapshot.clone();
        assert!(snapshot.same_items(&copy));
        assert_eq!(copy.len(), 1);
        assert!(copy.is_populated());
    }
}
