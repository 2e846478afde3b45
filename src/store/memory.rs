// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-memory repository.
//!
//! Holds entities in a `BTreeMap` behind a tokio `RwLock`. Nothing survives
//! the process; intended for tests, demos and single-node setups.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Entity, Repository};
use crate::error::Result;

/// Repository keeping entities in memory
#[derive(Debug)]
pub struct MemoryRepository<T> {
    items: RwLock<BTreeMap<String, T>>,
}

impl<T> MemoryRepository<T> {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored entities
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Check if empty
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn get(&self, key: &str) -> Result<Option<T>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn put(&self, entity: T) -> Result<()> {
        self.items.write().await.insert(entity.key(), entity);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.items.write().await.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<T>> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn children_of(&self, parent: &str) -> Result<Vec<T>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| item.parent_key().as_deref() == Some(parent))
            .cloned()
            .collect())
    }

    async fn delete_children_of(&self, parent: &str) -> Result<usize> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|_, item| item.parent_key().as_deref() != Some(parent));
        Ok(before - items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rundown::Segment;
    use crate::studio::Studio;

    #[tokio::test]
    async fn test_put_get_delete() {
        let repo: MemoryRepository<Studio> = MemoryRepository::new();
        assert!(repo.is_empty().await);

        repo.put(Studio::new("a")).await.unwrap();
        repo.put(Studio::new("b")).await.unwrap();
        assert_eq!(repo.len().await, 2);
        assert_eq!(repo.get("a").await.unwrap().map(|s| s.id), Some("a".to_string()));

        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert!(repo.get("a").await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let repo: MemoryRepository<Studio> = MemoryRepository::default();
        repo.put(Studio::new("a")).await.unwrap();
        let mut renamed = Studio::new("a");
        renamed.name = "Studio A".into();
        repo.put(renamed).await.unwrap();
        assert_eq!(repo.len().await, 1);
        assert_eq!(repo.get("a").await.unwrap().unwrap().name, "Studio A");
    }

    #[tokio::test]
    async fn test_children_of() {
        let repo: MemoryRepository<Segment> = MemoryRepository::new();
        let mut a = Segment::new("a", 1.0);
        a.set_rundown_id("r1");
        let mut b = Segment::new("b", 2.0);
        b.set_rundown_id("r1");
        let mut c = Segment::new("c", 1.0);
        c.set_rundown_id("r2");
        for segment in [a, b, c] {
            repo.put(segment).await.unwrap();
        }

        assert_eq!(repo.children_of("r1").await.unwrap().len(), 2);
        assert_eq!(repo.delete_children_of("r1").await.unwrap(), 2);
        assert!(repo.children_of("r1").await.unwrap().is_empty());
        assert_eq!(repo.len().await, 1);
    }
}
