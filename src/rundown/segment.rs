// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Segments: ranked containers of parts.
//!
//! Parts are kept sorted by rank on every mutation, so positional lookups
//! (first part, next part, parts before a part) are plain slice walks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::part::Part;
use super::piece::{unsynced_id, Piece, PieceLifespan, SyncState};
use super::runtime::SegmentRuntime;
use crate::error::{Result, RundownError};

/// A story: an ordered group of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment identifier
    id: String,
    /// Owning rundown
    #[serde(default)]
    rundown_id: String,
    /// Display name
    #[serde(default)]
    name: String,
    /// Sort rank within the rundown
    #[serde(default)]
    rank: f64,
    /// Parts sorted by rank
    #[serde(default)]
    parts: Vec<Part>,
    /// Hidden segments are never selected as next
    #[serde(default)]
    hidden: bool,
    /// Budgeted duration (ms)
    #[serde(default)]
    budget_duration: Option<u64>,
    #[serde(skip)]
    on_air: bool,
    #[serde(skip)]
    next: bool,
    #[serde(skip)]
    sync: SyncState,
}

impl Segment {
    /// Create a new empty segment
    pub fn new(id: impl Into<String>, rank: f64) -> Self {
        Self {
            id: id.into(),
            rundown_id: String::new(),
            name: String::new(),
            rank,
            parts: Vec::new(),
            hidden: false,
            budget_duration: None,
            on_air: false,
            next: false,
            sync: SyncState::Live,
        }
    }

    /// Get segment id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get owning rundown id
    pub fn rundown_id(&self) -> &str {
        &self.rundown_id
    }

    pub(crate) fn set_rundown_id(&mut self, rundown_id: impl Into<String>) {
        self.rundown_id = rundown_id.into();
    }

    /// Get name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get rank
    pub fn rank(&self) -> f64 {
        self.rank
    }

    /// Check if hidden
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Get budget duration
    pub fn budget_duration(&self) -> Option<u64> {
        self.budget_duration
    }

    /// Check if the segment can be selected as next
    pub fn is_playable(&self) -> bool {
        !self.hidden && !self.is_unsynced() && !self.parts.is_empty()
    }

    /// Get parts in rank order
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Get part by id
    pub fn part(&self, id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id() == id)
    }

    /// Get mutable part by id
    pub fn part_mut(&mut self, id: &str) -> Option<&mut Part> {
        self.parts.iter_mut().find(|p| p.id() == id)
    }

    /// Get first part
    pub fn first_part(&self) -> Option<&Part> {
        self.parts.first()
    }

    /// Get the part currently on air
    pub fn on_air_part(&self) -> Option<&Part> {
        self.parts.iter().find(|p| p.is_on_air())
    }

    /// Get the part after `part_id`
    pub fn find_next_part(&self, part_id: &str) -> Result<&Part> {
        let index = self.position(part_id)?;
        self.parts
            .get(index + 1)
            .ok_or_else(|| RundownError::LastPartInSegment(part_id.to_string()))
    }

    /// Check if on air
    pub fn is_on_air(&self) -> bool {
        self.on_air
    }

    /// Put on air
    pub fn put_on_air(&mut self) {
        self.on_air = true;
    }

    /// Take off air
    pub fn take_off_air(&mut self) {
        self.on_air = false;
    }

    /// Check if marked next
    pub fn is_next(&self) -> bool {
        self.next
    }

    /// Mark as next
    pub fn mark_as_next(&mut self) {
        self.next = true;
    }

    /// Clear the next mark
    pub fn unmark_as_next(&mut self) {
        self.next = false;
    }

    /// Check if unsynced
    pub fn is_unsynced(&self) -> bool {
        self.sync == SyncState::Unsynced
    }

    /// Insert a part in rank order
    pub fn insert_part(&mut self, mut part: Part) -> Result<()> {
        if self.part(part.id()).is_some() {
            return Err(RundownError::UnsupportedOperation(format!(
                "part {} already exists in segment {}",
                part.id(),
                self.id
            )));
        }
        part.set_segment_id(self.id.clone());
        part.adopt_pieces();
        self.parts.push(part);
        self.sort_parts();
        Ok(())
    }

    /// Replace a part, keeping its runtime state. Returns the old version.
    pub fn update_part(&mut self, mut part: Part) -> Result<Part> {
        let index = self.position(part.id())?;
        part.set_segment_id(self.id.clone());
        part.adopt_pieces();
        part.adopt_runtime(&self.parts[index]);
        let old = std::mem::replace(&mut self.parts[index], part);
        self.sort_parts();
        Ok(old)
    }

    /// Remove a part
    pub fn remove_part(&mut self, part_id: &str) -> Result<Part> {
        let index = self.position(part_id)?;
        Ok(self.parts.remove(index))
    }

    /// Drop unsynced parts, returning their ids
    pub fn remove_unsynced_parts(&mut self) -> Vec<String> {
        let removed = self
            .parts
            .iter()
            .filter(|p| p.is_unsynced())
            .map(|p| p.id().to_string())
            .collect();
        self.parts.retain(|p| !p.is_unsynced());
        removed
    }

    /// Drop ad hoc parts
    pub fn remove_unplanned_parts(&mut self) {
        self.parts.retain(Part::is_planned);
    }

    /// Return to the state of a freshly ingested segment
    pub fn reset(&mut self) {
        self.parts.retain(|p| p.is_planned() && !p.is_unsynced());
        for part in &mut self.parts {
            part.reset();
        }
        self.on_air = false;
        self.next = false;
    }

    /// Mark unsynced in place.
    ///
    /// The rank drops by one so the segment sorts before a re-ingested
    /// sibling, and only on-air parts survive, as unsynced copies.
    pub fn mark_as_unsynced(&mut self) {
        self.sync = SyncState::Unsynced;
        self.rank -= 1.0;
        self.parts = self
            .parts
            .iter()
            .filter(|p| p.is_on_air())
            .map(Part::unsynced_copy)
            .collect();
    }

    /// Clone under a suffixed id
    pub fn unsynced_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = unsynced_id(&self.id);
        copy.sync = SyncState::Unsynced;
        for part in &mut copy.parts {
            part.set_segment_id(copy.id.clone());
        }
        copy
    }

    /// Nearest spanning piece per layer among parts before `part_id`.
    ///
    /// Parts are scanned newest-first; layers in `known_layers` are skipped.
    pub fn get_first_spanning_piece_for_each_layer_before_part(
        &self,
        part_id: &str,
        known_layers: &BTreeSet<String>,
    ) -> Result<Vec<&Piece>> {
        let index = self.position(part_id)?;
        Ok(first_piece_per_layer(
            self.parts[..index].iter().rev(),
            &PieceLifespan::SEGMENT_SPANNING,
            known_layers,
        ))
    }

    /// Nearest rundown-spanning piece per layer across all parts
    pub fn get_first_spanning_rundown_piece_for_each_layer_for_all_parts(
        &self,
        known_layers: &BTreeSet<String>,
    ) -> Vec<&Piece> {
        first_piece_per_layer(
            self.parts.iter().rev(),
            &PieceLifespan::RUNDOWN_SPANNING,
            known_layers,
        )
    }

    /// Insert an ad hoc part right after the on-air part.
    ///
    /// An unplanned part already sitting there is replaced rather than
    /// stacked behind.
    pub fn insert_part_after_active_part(&mut self, mut part: Part) -> Result<()> {
        let index = self
            .parts
            .iter()
            .position(Part::is_on_air)
            .ok_or_else(|| RundownError::not_found("on-air part in segment", self.id.clone()))?;
        let active_rank = self.parts[index].rank();

        let rank = match self.parts.get(index + 1) {
            Some(following) if !following.is_planned() => {
                let rank = following.rank();
                self.parts.remove(index + 1);
                rank
            }
            Some(following) => (active_rank + following.rank()) / 2.0,
            None => active_rank + 1.0,
        };

        part.set_rank(rank);
        self.insert_part(part)
    }

    /// Carry runtime state over from the version this segment replaces.
    ///
    /// Matching parts keep their on-air state, ad hoc parts survive, and an
    /// on-air part missing from the new version stays in place as unsynced.
    pub(crate) fn adopt_runtime(&mut self, old: &Segment) {
        self.on_air = old.on_air;
        self.next = old.next;

        for part in &mut self.parts {
            if let Some(previous) = old.part(part.id()) {
                part.adopt_runtime(previous);
            }
        }

        for previous in old.parts() {
            if self.part(previous.id()).is_some() {
                continue;
            }
            if previous.is_on_air() {
                let mut stand_in = previous.clone();
                stand_in.mark_as_unsynced();
                self.parts.push(stand_in);
            } else if !previous.is_planned() {
                self.parts.push(previous.clone());
            }
        }

        self.sort_parts();
    }

    pub(crate) fn runtime(&self) -> SegmentRuntime {
        SegmentRuntime {
            on_air: self.on_air,
            next: self.next,
            sync: self.sync,
            parts: self.parts.iter().map(|p| (p.id().to_string(), p.runtime())).collect(),
        }
    }

    pub(crate) fn apply_runtime(&mut self, runtime: &SegmentRuntime) {
        self.on_air = runtime.on_air;
        self.next = runtime.next;
        self.sync = runtime.sync;
        for part in &mut self.parts {
            if let Some(state) = runtime.parts.get(part.id()) {
                part.apply_runtime(state);
            }
        }
    }

    fn position(&self, part_id: &str) -> Result<usize> {
        self.parts
            .iter()
            .position(|p| p.id() == part_id)
            .ok_or_else(|| RundownError::not_found("part", part_id))
    }

    fn sort_parts(&mut self) {
        self.parts.sort_by(|a, b| a.rank().total_cmp(&b.rank()));
    }

    /// Attach parts deserialized without an owner
    pub(crate) fn adopt_parts(&mut self) {
        for part in &mut self.parts {
            part.set_segment_id(self.id.clone());
            part.adopt_pieces();
        }
        self.sort_parts();
    }

    /// Builder: set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: add part
    pub fn with_part(mut self, mut part: Part) -> Self {
        part.set_segment_id(self.id.clone());
        part.adopt_pieces();
        self.parts.push(part);
        self.sort_parts();
        self
    }

    /// Builder: hide segment
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Builder: set budget duration
    pub fn with_budget_duration(mut self, duration: u64) -> Self {
        self.budget_duration = Some(duration);
        self
    }
}

fn first_piece_per_layer<'a>(
    parts: impl Iterator<Item = &'a Part>,
    lifespans: &[PieceLifespan],
    known_layers: &BTreeSet<String>,
) -> Vec<&'a Piece> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut found = Vec::new();

    for part in parts {
        for piece in part.pieces().iter().rev() {
            if !lifespans.contains(&piece.lifespan())
                || known_layers.contains(piece.layer())
                || seen.contains(piece.layer())
            {
                continue;
            }
            seen.insert(piece.layer());
            found.push(piece);
        }
    }

    found
}
