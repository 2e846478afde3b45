// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Persistence port.
//!
//! The core never talks to storage directly. A [`RundownStore`] splits a
//! rundown into a [`RundownRecord`] plus its segments and writes them
//! through [`Repository`] implementations; loading reassembles them and
//! restores playout state for a rundown that was active.

mod memory;

pub use memory::MemoryRepository;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RundownError};
use crate::rundown::{
    AlreadyActiveProperties, Part, Piece, Rundown, RundownCursor, RundownMode, RuntimeSnapshot, Segment,
};
use crate::studio::Studio;
use crate::timeline::TimelineObject;

/// Something a repository can store
pub trait Entity: Clone + Send + Sync + 'static {
    /// Storage key
    fn key(&self) -> String;

    /// Key of the owning entity, if any
    fn parent_key(&self) -> Option<String> {
        None
    }
}

/// Storage for one entity type
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Fetch by key
    async fn get(&self, key: &str) -> Result<Option<T>>;

    /// Insert or replace
    async fn put(&self, entity: T) -> Result<()>;

    /// Delete by key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All stored entities
    async fn list(&self) -> Result<Vec<T>>;

    /// Entities owned by `parent`
    async fn children_of(&self, parent: &str) -> Result<Vec<T>>;

    /// Delete everything owned by `parent`, returning the count removed
    async fn delete_children_of(&self, parent: &str) -> Result<usize>;
}

/// Rundown-level fields, without segments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RundownRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub show_style_variant_id: Option<String>,
    #[serde(default)]
    pub mode: RundownMode,
    #[serde(default)]
    pub segment_ids: Vec<String>,
    #[serde(default)]
    pub baseline_objects: Vec<TimelineObject>,
    #[serde(default)]
    pub active: Option<RundownCursor>,
    #[serde(default)]
    pub next: Option<RundownCursor>,
    #[serde(default)]
    pub previous_part: Option<Part>,
    #[serde(default)]
    pub infinite_pieces: BTreeMap<String, Piece>,
    #[serde(default)]
    pub history: Vec<Part>,
    #[serde(default)]
    pub persistent_state: Option<serde_yaml::Value>,
    /// On-air flags and executed-at stamps of the rundown's segments and parts
    #[serde(default)]
    pub runtime: RuntimeSnapshot,
}

impl RundownRecord {
    /// Snapshot a rundown
    pub fn from_rundown(rundown: &Rundown) -> Self {
        let props = rundown.already_active_properties();
        Self {
            id: rundown.id().to_string(),
            name: rundown.name().to_string(),
            show_style_variant_id: rundown.show_style_variant_id().map(str::to_string),
            mode: rundown.mode(),
            segment_ids: rundown.segments().iter().map(|s| s.id().to_string()).collect(),
            baseline_objects: rundown.baseline_objects().to_vec(),
            active: props.active,
            next: props.next,
            previous_part: props.previous_part,
            infinite_pieces: props.infinite_pieces,
            history: props.history,
            persistent_state: rundown.persistent_state().cloned(),
            runtime: props.runtime,
        }
    }
}

impl Entity for RundownRecord {
    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Key of a segment within its rundown
pub fn segment_key(rundown_id: &str, segment_id: &str) -> String {
    format!("{}/{}", rundown_id, segment_id)
}

impl Entity for Segment {
    fn key(&self) -> String {
        segment_key(self.rundown_id(), self.id())
    }

    fn parent_key(&self) -> Option<String> {
        Some(self.rundown_id().to_string())
    }
}

impl Entity for Studio {
    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Reads and writes whole rundowns through entity repositories
#[derive(Clone)]
pub struct RundownStore {
    rundowns: Arc<dyn Repository<RundownRecord>>,
    segments: Arc<dyn Repository<Segment>>,
    studios: Arc<dyn Repository<Studio>>,
}

impl RundownStore {
    /// Create a store over the given repositories
    pub fn new(
        rundowns: Arc<dyn Repository<RundownRecord>>,
        segments: Arc<dyn Repository<Segment>>,
        studios: Arc<dyn Repository<Studio>>,
    ) -> Self {
        Self {
            rundowns,
            segments,
            studios,
        }
    }

    /// Store backed entirely by memory
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryRepository::<RundownRecord>::new()),
            Arc::new(MemoryRepository::<Segment>::new()),
            Arc::new(MemoryRepository::<Studio>::new()),
        )
    }

    /// Write a rundown and its segments, dropping segments no longer present
    pub async fn save(&self, rundown: &Rundown) -> Result<()> {
        let record = RundownRecord::from_rundown(rundown);
        if let Some(previous) = self.rundowns.get(rundown.id()).await? {
            for stale in previous
                .segment_ids
                .iter()
                .filter(|id| !record.segment_ids.contains(id))
            {
                self.segments.delete(&segment_key(rundown.id(), stale)).await?;
            }
        }
        for segment in rundown.segments() {
            self.segments.put(segment.clone()).await?;
        }
        debug!(rundown = %rundown.id(), segments = record.segment_ids.len(), "rundown saved");
        self.rundowns.put(record).await
    }

    /// Reassemble a rundown, restoring playout state when it was active
    pub async fn load(&self, id: &str) -> Result<Rundown> {
        let record = self
            .rundowns
            .get(id)
            .await?
            .ok_or_else(|| RundownError::not_found("rundown", id))?;

        let mut rundown = Rundown::new(&record.id, &record.name);
        if let Some(variant) = &record.show_style_variant_id {
            rundown = rundown.with_show_style_variant(variant);
        }
        for object in record.baseline_objects {
            rundown = rundown.with_baseline_object(object);
        }
        for segment_id in &record.segment_ids {
            let segment = self
                .segments
                .get(&segment_key(id, segment_id))
                .await?
                .ok_or_else(|| RundownError::Persistence(format!("segment {} missing from store", segment_id)))?;
            rundown = rundown.with_segment(segment);
        }

        if record.mode != RundownMode::Inactive {
            let props = AlreadyActiveProperties {
                active: record.active,
                next: record.next,
                previous_part: record.previous_part,
                infinite_pieces: record.infinite_pieces,
                history: record.history,
                runtime: record.runtime,
            };
            rundown = rundown.restore(record.mode, props)?;
        }
        rundown.set_persistent_state(record.persistent_state);
        Ok(rundown)
    }

    /// Delete a rundown and its segments
    pub async fn delete(&self, id: &str) -> Result<bool> {
        if self.rundowns.get(id).await?.is_none() {
            return Ok(false);
        }
        let removed = self.segments.delete_children_of(id).await?;
        debug!(rundown = %id, segments = removed, "rundown deleted");
        self.rundowns.delete(id).await
    }

    /// Stored segments of a rundown, in rank order
    pub async fn segments_of(&self, rundown_id: &str) -> Result<Vec<Segment>> {
        let mut segments = self.segments.children_of(rundown_id).await?;
        segments.sort_by(|a, b| a.rank().total_cmp(&b.rank()));
        Ok(segments)
    }

    /// Ids of all stored rundowns
    pub async fn rundown_ids(&self) -> Result<Vec<String>> {
        Ok(self.rundowns.list().await?.into_iter().map(|r| r.id).collect())
    }

    /// Fetch a studio
    pub async fn studio(&self, id: &str) -> Result<Option<Studio>> {
        self.studios.get(id).await
    }

    /// Store a studio
    pub async fn put_studio(&self, studio: Studio) -> Result<()> {
        self.studios.put(studio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::marker::PhantomData;

    use serde::de::DeserializeOwned;
    use tokio::sync::RwLock;

    use crate::rundown::PieceLifespan;
    use crate::studio::{LookaheadMode, StudioLayer};
    use crate::timeline::build;

    /// Repository that keeps every entity as a YAML document
    struct YamlRepository<T> {
        rows: RwLock<BTreeMap<String, (Option<String>, String)>>,
        _entity: PhantomData<fn() -> T>,
    }

    impl<T> YamlRepository<T> {
        fn new() -> Self {
            Self {
                rows: RwLock::new(BTreeMap::new()),
                _entity: PhantomData,
            }
        }
    }

    fn decode<T: DeserializeOwned>(yaml: &str) -> Result<T> {
        serde_yaml::from_str(yaml).map_err(|e| RundownError::Persistence(e.to_string()))
    }

    #[async_trait]
    impl<T> Repository<T> for YamlRepository<T>
    where
        T: Entity + Serialize + DeserializeOwned,
    {
        async fn get(&self, key: &str) -> Result<Option<T>> {
            match self.rows.read().await.get(key) {
                Some((_, yaml)) => decode(yaml).map(Some),
                None => Ok(None),
            }
        }

        async fn put(&self, entity: T) -> Result<()> {
            let yaml = serde_yaml::to_string(&entity).map_err(|e| RundownError::Persistence(e.to_string()))?;
            self.rows.write().await.insert(entity.key(), (entity.parent_key(), yaml));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool> {
            Ok(self.rows.write().await.remove(key).is_some())
        }

        async fn list(&self) -> Result<Vec<T>> {
            self.rows.read().await.values().map(|(_, yaml)| decode(yaml)).collect()
        }

        async fn children_of(&self, parent: &str) -> Result<Vec<T>> {
            self.rows
                .read()
                .await
                .values()
                .filter(|(owner, _)| owner.as_deref() == Some(parent))
                .map(|(_, yaml)| decode(yaml))
                .collect()
        }

        async fn delete_children_of(&self, parent: &str) -> Result<usize> {
            let mut rows = self.rows.write().await;
            let before = rows.len();
            rows.retain(|_, (owner, _)| owner.as_deref() != Some(parent));
            Ok(before - rows.len())
        }
    }

    fn yaml_store() -> RundownStore {
        RundownStore::new(
            Arc::new(YamlRepository::<RundownRecord>::new()),
            Arc::new(YamlRepository::<Segment>::new()),
            Arc::new(YamlRepository::<Studio>::new()),
        )
    }

    fn rundown() -> Rundown {
        Rundown::new("r1", "Morning")
            .with_show_style_variant("news")
            .with_baseline_object(TimelineObject::new("bg", "background"))
            .with_segment(
                Segment::new("s1", 1.0)
                    .with_part(Part::new("p1", 1.0))
                    .with_part(Part::new("p2", 2.0)),
            )
            .with_segment(Segment::new("s2", 2.0).with_part(Part::new("p3", 1.0)))
    }

    #[tokio::test]
    async fn test_round_trip_inactive() {
        let store = RundownStore::in_memory();
        store.save(&rundown()).await.unwrap();

        let loaded = store.load("r1").await.unwrap();
        assert_eq!(loaded.name(), "Morning");
        assert_eq!(loaded.show_style_variant_id(), Some("news"));
        assert_eq!(loaded.segments().len(), 2);
        assert_eq!(loaded.baseline_objects().len(), 1);
        assert!(!loaded.is_active());
    }

    #[tokio::test]
    async fn test_round_trip_active_restores_cursors() {
        let store = RundownStore::in_memory();
        let mut r = rundown();
        r.activate().unwrap();
        r.take_next_at(1_000).unwrap();
        store.save(&r).await.unwrap();

        let loaded = store.load("r1").await.unwrap();
        assert_eq!(loaded.mode(), RundownMode::Active);
        assert_eq!(loaded.active_part().map(Part::id), Some("p1"));
        assert_eq!(loaded.next_part().map(Part::id), Some("p2"));
        assert_eq!(loaded.active_part().unwrap().executed_at(), 1_000);
    }

    #[tokio::test]
    async fn test_yaml_round_trip_keeps_runtime_state() {
        let store = yaml_store();
        let studio = Studio::new("main").with_layer(StudioLayer::new("camera", LookaheadMode::None));
        let mut r = Rundown::new("r1", "Morning")
            .with_segment(
                Segment::new("s1", 1.0)
                    .with_part(Part::new("a", 1.0).with_piece(Piece::new("cam_a", "camera")))
                    .with_part(
                        Part::new("b", 2.0).with_piece(Piece::new("cam_b", "camera")).with_piece(
                            Piece::new("logo", "gfx").with_lifespan(PieceLifespan::StickyUntilRundownChange),
                        ),
                    ),
            )
            .with_segment(Segment::new("s2", 2.0).with_part(Part::new("c", 1.0)));
        r.activate().unwrap();
        r.take_next_at(1_000).unwrap();
        r.take_next_at(2_000).unwrap();
        store.save(&r).await.unwrap();

        let mut loaded = store.load("r1").await.unwrap();
        let active = loaded.active_part().unwrap();
        assert_eq!(active.id(), "b");
        assert!(active.is_on_air());
        assert_eq!(active.executed_at(), 2_000);
        assert_eq!(active.piece("cam_b").unwrap().executed_at(), 2_000);
        assert_eq!(active.timings(), r.active_part().unwrap().timings());
        assert!(loaded.active_segment().unwrap().is_on_air());
        assert!(!loaded.find_part("a").unwrap().is_on_air());
        assert!(loaded.next_part().unwrap().is_next());
        assert!(loaded.next_segment().unwrap().is_next());
        assert_eq!(loaded.previous_part().unwrap().executed_at(), 1_000);
        assert_eq!(loaded.history().next().unwrap().executed_at(), 1_000);
        assert_eq!(loaded.infinite_pieces()["gfx"].executed_at(), 2_000);

        assert_eq!(build(&loaded, Some(&studio)).unwrap(), build(&r, Some(&studio)).unwrap());

        loaded.take_next_at(3_000).unwrap();
        assert_eq!(loaded.previous_part().unwrap().id(), "b");
        assert_eq!(loaded.infinite_pieces()["gfx"].executed_at(), 2_000);
        assert!(build(&loaded, Some(&studio)).is_ok());
    }

    #[test]
    fn test_record_runtime_survives_yaml() {
        let mut r = rundown();
        r.activate().unwrap();
        r.take_next_at(1_000).unwrap();
        let record = RundownRecord::from_rundown(&r);

        let yaml = serde_yaml::to_string(&record).unwrap();
        let parsed: RundownRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.runtime, r.runtime_snapshot());
        assert_eq!(parsed.runtime.segments["s1"].parts["p1"].executed_at, 1_000);
        assert!(parsed.runtime.segments["s1"].parts["p2"].next);
    }

    #[tokio::test]
    async fn test_save_drops_removed_segments() {
        let store = RundownStore::in_memory();
        let mut r = rundown();
        store.save(&r).await.unwrap();
        r.remove_segment("s2").unwrap();
        store.save(&r).await.unwrap();

        assert!(store.segments.get("r1/s2").await.unwrap().is_none());
        assert_eq!(store.load("r1").await.unwrap().segments().len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let store = RundownStore::in_memory();
        assert!(matches!(
            store.load("nope").await,
            Err(RundownError::NotFound { kind: "rundown", .. })
        ));
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = RundownStore::in_memory();
        store.save(&rundown()).await.unwrap();
        assert_eq!(store.rundown_ids().await.unwrap(), vec!["r1".to_string()]);
        assert!(store.delete("r1").await.unwrap());
        assert!(store.rundown_ids().await.unwrap().is_empty());
        assert!(store.segments.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_segments_of() {
        let store = RundownStore::in_memory();
        store.save(&rundown()).await.unwrap();
        store
            .save(&Rundown::new("r2", "Other").with_segment(Segment::new("x", 1.0)))
            .await
            .unwrap();

        let ids: Vec<_> = store
            .segments_of("r1")
            .await
            .unwrap()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);

        assert!(store.delete("r1").await.unwrap());
        assert_eq!(store.segments_of("r2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_studios() {
        let store = RundownStore::in_memory();
        store.put_studio(Studio::new("main")).await.unwrap();
        assert!(store.studio("main").await.unwrap().is_some());
        assert!(store.studio("other").await.unwrap().is_none());
    }
}
