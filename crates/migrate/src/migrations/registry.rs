//! Migration Registry - the ordered, validated schema history
//!
//! The registry is built once at startup and never changes afterwards.
//! Registration order is the historical sequence: the engine applies in this
//! order and rolls back in its reverse.

use std::collections::HashSet;

use super::definitions::Migration;
use crate::error::{MigrationError, MigrationResult};

/// Ordered, name-unique sequence of migrations
#[derive(Debug, Clone, Default)]
pub struct Registry {
    migrations: Vec<Migration>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names
    pub fn new(migrations: Vec<Migration>) -> MigrationResult<Self> {
        let mut seen = HashSet::with_capacity(migrations.len());
        for migration in &migrations {
            if !seen.insert(migration.name()) {
                return Err(MigrationError::DuplicateMigrationName {
                    name: migration.name().to_string(),
                });
            }
        }

        Ok(Self { migrations })
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Migrations in registration order
    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.name()).collect()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Collects migrations before validating them into a [`Registry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    migrations: Vec<Migration>,
}

impl RegistryBuilder {
    pub fn add(mut self, migration: Migration) -> Self {
        self.migrations.push(migration);
        self
    }

    pub fn extend(mut self, migrations: impl IntoIterator<Item = Migration>) -> Self {
        self.migrations.extend(migrations);
        self
    }

    pub fn build(self) -> MigrationResult<Registry> {
        Registry::new(self.migrations)
    }
}
