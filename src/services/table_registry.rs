//! Append-only registry of versioned data tables.

use std::collections::BTreeMap;

use crate::domain::errors::{DomainError, DomainResult};

/// A data table identified by a monotonically increasing version.
pub trait VersionedTable {
    /// Table name used in error messages
    const TABLE: &'static str;

    fn version(&self) -> u32;
}

/// Holds every published version of a table. Versions are never replaced;
/// the newest one is active.
#[derive(Debug, Clone)]
pub struct TableRegistry<T> {
    active: T,
    superseded: BTreeMap<u32, T>,
}

impl<T: VersionedTable> TableRegistry<T> {
    pub fn new(initial: T) -> Self {
        Self {
            active: initial,
            superseded: BTreeMap::new(),
        }
    }

    /// Publish a new version. Fails unless it is strictly newer than the
    /// active one.
    pub fn publish(&mut self, table: T) -> DomainResult<()> {
        let current = self.active.version();
        if table.version() <= current {
            return Err(DomainError::TableVersionConflict {
                table: T::TABLE.to_string(),
                version: table.version(),
                current,
            });
        }
        let previous = std::mem::replace(&mut self.active, table);
        self.superseded.insert(current, previous);
        Ok(())
    }

    pub fn active(&self) -> &T {
        &self.active
    }

    pub fn get(&self, version: u32) -> DomainResult<&T> {
        if version == self.active.version() {
            return Ok(&self.active);
        }
        self.superseded
            .get(&version)
            .ok_or_else(|| DomainError::UnknownTableVersion {
                table: T::TABLE.to_string(),
                version,
            })
    }

    pub fn versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self.superseded.keys().copied().collect();
        versions.push(self.active.version());
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Table(u32);

    impl VersionedTable for Table {
        const TABLE: &'static str = "test";

        fn version(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_publish_newer_version_becomes_active() {
        let mut registry = TableRegistry::new(Table(1));
        registry.publish(Table(2)).unwrap();
        assert_eq!(registry.active().version(), 2);
        assert_eq!(registry.get(1).unwrap().version(), 1);
        assert_eq!(registry.versions(), vec![1, 2]);
    }

    #[test]
    fn test_publish_same_or_older_version_fails() {
        let mut registry = TableRegistry::new(Table(3));
        for version in [3, 2] {
            let err = registry.publish(Table(version)).unwrap_err();
            assert!(matches!(
                err,
                DomainError::TableVersionConflict { current: 3, .. }
            ));
        }
        assert_eq!(registry.versions(), vec![3]);
    }

    #[test]
    fn test_unknown_version() {
        let registry = TableRegistry::new(Table(1));
        assert!(matches!(
            registry.get(9),
            Err(DomainError::UnknownTableVersion { version: 9, .. })
        ));
    }
}
