// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The rundown aggregate and its playout state machine.
//!
//! A rundown owns its segments (sorted by rank), the active and next
//! cursors, the previous part, the infinite-piece map and a bounded take
//! history. Transitions:
//! - `activate` / `enter_rehearsal`: reset everything and prime the next
//!   cursor at the first playable part
//! - `take_next`: promote next to active and advance the next cursor
//! - `set_next`: operator override of the next cursor
//! - `deactivate`: clear cursors and continuity state

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cursor::{Owner, RundownCursor};
use super::epoch_millis;
use super::part::Part;
use super::piece::Piece;
use super::runtime::RuntimeSnapshot;
use super::segment::Segment;
use crate::error::{Result, RundownError};
use crate::timeline::TimelineObject;

/// Maximum number of parts kept in take history
pub const HISTORY_LIMIT: usize = 30;

/// Playout mode of a rundown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RundownMode {
    #[default]
    Inactive,
    Rehearsal,
    Active,
}

/// State restored when reloading a rundown that was already on air
#[derive(Debug, Clone, Default)]
pub struct AlreadyActiveProperties {
    pub active: Option<RundownCursor>,
    pub next: Option<RundownCursor>,
    pub previous_part: Option<Part>,
    pub infinite_pieces: BTreeMap<String, Piece>,
    pub history: Vec<Part>,
    /// Flags and executed-at stamps lost when the above are serialized
    pub runtime: RuntimeSnapshot,
}

/// A complete show
#[derive(Debug, Clone)]
pub struct Rundown {
    id: String,
    name: String,
    show_style_variant_id: Option<String>,
    pub(super) mode: RundownMode,
    pub(super) segments: Vec<Segment>,
    baseline_objects: Vec<TimelineObject>,
    pub(super) active: Option<RundownCursor>,
    pub(super) next: Option<RundownCursor>,
    pub(super) previous_part: Option<Part>,
    pub(super) infinite_pieces: BTreeMap<String, Piece>,
    pub(super) history: VecDeque<Part>,
    persistent_state: Option<serde_yaml::Value>,
}

impl Rundown {
    /// Create an empty, inactive rundown
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            show_style_variant_id: None,
            mode: RundownMode::Inactive,
            segments: Vec::new(),
            baseline_objects: Vec::new(),
            active: None,
            next: None,
            previous_part: None,
            infinite_pieces: BTreeMap::new(),
            history: VecDeque::new(),
            persistent_state: None,
        }
    }

    /// Reload an already-active rundown with its playout state.
    ///
    /// Runtime state from `props.runtime` is re-applied by id, then the
    /// cursors re-mark the on-air and next parts. Fails with
    /// `NotActivated` when `mode` is inactive.
    pub fn restore(mut self, mode: RundownMode, props: AlreadyActiveProperties) -> Result<Self> {
        if mode == RundownMode::Inactive {
            return Err(RundownError::NotActivated(self.id));
        }
        let runtime = props.runtime;
        self.mode = mode;
        self.active = props.active;
        self.next = props.next;
        self.previous_part = props.previous_part;
        self.infinite_pieces = props.infinite_pieces;
        self.history = props.history.into_iter().collect();
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }

        for segment in &mut self.segments {
            if let Some(state) = runtime.segments.get(segment.id()) {
                segment.apply_runtime(state);
            }
        }
        if let (Some(part), Some(state)) = (self.previous_part.as_mut(), runtime.previous_part.as_ref()) {
            part.apply_runtime(state);
        }
        // History is capped from the front, so align from the back
        for (part, state) in self.history.iter_mut().rev().zip(runtime.history.iter().rev()) {
            part.apply_runtime(state);
        }
        for (layer, piece) in &mut self.infinite_pieces {
            if let Some(state) = runtime.infinite_pieces.get(layer) {
                piece.apply_runtime(state);
            }
        }

        if let Some(cursor) = self.active.clone() {
            if let Some(segment) = self.segment_mut(cursor.segment_id()) {
                segment.put_on_air();
                if let Some(part) = segment.part_mut(cursor.part_id()) {
                    if !part.is_on_air() {
                        let at = part.executed_at();
                        part.put_on_air(at);
                    }
                }
            }
        }
        if let Some(cursor) = self.next.clone() {
            if let Some(segment) = self.segment_mut(cursor.segment_id()) {
                segment.mark_as_next();
                if let Some(part) = segment.part_mut(cursor.part_id()) {
                    part.mark_as_next();
                }
            }
        }

        debug!(rundown = %self.id, ?mode, "restored active rundown");
        Ok(self)
    }

    /// Snapshot of the playout state for persistence
    pub fn already_active_properties(&self) -> AlreadyActiveProperties {
        AlreadyActiveProperties {
            active: self.active.clone(),
            next: self.next.clone(),
            previous_part: self.previous_part.clone(),
            infinite_pieces: self.infinite_pieces.clone(),
            history: self.history.iter().cloned().collect(),
            runtime: self.runtime_snapshot(),
        }
    }

    /// Runtime state of every segment, part and tracked piece
    pub fn runtime_snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            segments: self.segments.iter().map(|s| (s.id().to_string(), s.runtime())).collect(),
            previous_part: self.previous_part.as_ref().map(Part::runtime),
            history: self.history.iter().map(Part::runtime).collect(),
            infinite_pieces: self
                .infinite_pieces
                .iter()
                .map(|(layer, piece)| (layer.clone(), piece.runtime()))
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Get rundown id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get show style variant id
    pub fn show_style_variant_id(&self) -> Option<&str> {
        self.show_style_variant_id.as_deref()
    }

    /// Get mode
    pub fn mode(&self) -> RundownMode {
        self.mode
    }

    /// Check if active or in rehearsal
    pub fn is_active(&self) -> bool {
        self.mode != RundownMode::Inactive
    }

    /// Get segments in rank order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Get segment by id
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id() == id)
    }

    /// Get baseline objects
    pub fn baseline_objects(&self) -> &[TimelineObject] {
        &self.baseline_objects
    }

    /// Get active cursor
    pub fn active_cursor(&self) -> Option<&RundownCursor> {
        self.active.as_ref()
    }

    /// Get next cursor
    pub fn next_cursor(&self) -> Option<&RundownCursor> {
        self.next.as_ref()
    }

    /// Get the part on air
    pub fn active_part(&self) -> Option<&Part> {
        self.active.as_ref().and_then(|c| self.resolve(c))
    }

    /// Get the segment on air
    pub fn active_segment(&self) -> Option<&Segment> {
        self.active.as_ref().and_then(|c| self.segment(c.segment_id()))
    }

    /// Get the part queued next
    pub fn next_part(&self) -> Option<&Part> {
        self.next.as_ref().and_then(|c| self.resolve(c))
    }

    /// Get the segment queued next
    pub fn next_segment(&self) -> Option<&Segment> {
        self.next.as_ref().and_then(|c| self.segment(c.segment_id()))
    }

    /// Get the part that was on air before the active one
    pub fn previous_part(&self) -> Option<&Part> {
        self.previous_part.as_ref()
    }

    /// Get take history, oldest first
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &Part> + ExactSizeIterator {
        self.history.iter()
    }

    /// Get infinite pieces by layer
    pub fn infinite_pieces(&self) -> &BTreeMap<String, Piece> {
        &self.infinite_pieces
    }

    /// Get opaque blueprint state
    pub fn persistent_state(&self) -> Option<&serde_yaml::Value> {
        self.persistent_state.as_ref()
    }

    /// Set opaque blueprint state
    pub fn set_persistent_state(&mut self, state: Option<serde_yaml::Value>) {
        self.persistent_state = state;
    }

    /// Find a part anywhere in the rundown
    pub fn find_part(&self, part_id: &str) -> Option<&Part> {
        self.segments.iter().find_map(|s| s.part(part_id))
    }

    /// First part of the first playable segment
    pub fn first_playable_part(&self) -> Option<&Part> {
        self.segments
            .iter()
            .find(|s| s.is_playable())
            .and_then(Segment::first_part)
    }

    /// Part after `part_id` in rundown order, skipping unplayable segments
    pub fn find_part_after(&self, part_id: &str) -> Result<&Part> {
        let index = self
            .segments
            .iter()
            .position(|s| s.part(part_id).is_some())
            .ok_or_else(|| RundownError::not_found("part", part_id))?;
        match self.segments[index].find_next_part(part_id) {
            Ok(part) => Ok(part),
            Err(err) if err.is_boundary() => self.segments[index + 1..]
                .iter()
                .find(|s| s.is_playable())
                .and_then(Segment::first_part)
                .ok_or_else(|| RundownError::LastPartInRundown(part_id.to_string())),
            Err(err) => Err(err),
        }
    }

    /// Most recent history part matching `predicate`, then the active part
    pub fn find_part_in_history<F>(&self, predicate: F) -> Result<Part>
    where
        F: Fn(&Part) -> bool,
    {
        self.history
            .iter()
            .rev()
            .find(|p| predicate(*p))
            .or_else(|| self.active_part().filter(|p| predicate(*p)))
            .cloned()
            .ok_or(RundownError::NoPartInHistory)
    }

    // ------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------

    /// Go on air; only from inactive
    pub fn activate(&mut self) -> Result<()> {
        if self.mode != RundownMode::Inactive {
            return Err(RundownError::AlreadyActivated(self.id.clone()));
        }
        self.prime(RundownMode::Active)
    }

    /// Enter rehearsal mode; only from inactive
    pub fn enter_rehearsal(&mut self) -> Result<()> {
        match self.mode {
            RundownMode::Active => Err(RundownError::AlreadyActivated(self.id.clone())),
            RundownMode::Rehearsal => Err(RundownError::AlreadyRehearsal(self.id.clone())),
            RundownMode::Inactive => self.prime(RundownMode::Rehearsal),
        }
    }

    /// Deactivate, then activate. Always ends on air.
    pub fn reset(&mut self) -> Result<()> {
        self.deactivate()?;
        self.activate()
    }

    /// Go off air
    pub fn deactivate(&mut self) -> Result<()> {
        self.require_active()?;

        if let Some(active) = self.active.take() {
            if let Some(segment) = self.segment_mut(active.segment_id()) {
                segment.take_off_air();
                if let Some(part) = segment.part_mut(active.part_id()) {
                    part.take_off_air();
                }
            }
        }
        if let Some(next) = self.next.take() {
            self.unmark_next(&next);
        }
        self.previous_part = None;
        self.infinite_pieces.clear();
        self.persistent_state = None;
        self.mode = RundownMode::Inactive;

        info!(rundown = %self.id, "deactivated");
        Ok(())
    }

    fn prime(&mut self, mode: RundownMode) -> Result<()> {
        let has_playable = self.segments.iter().any(|s| {
            !s.is_hidden()
                && !s.is_unsynced()
                && s.parts().iter().any(|p| p.is_planned() && !p.is_unsynced())
        });
        if !has_playable {
            return Err(RundownError::not_found("playable segment in rundown", self.id.clone()));
        }

        self.segments.retain(|s| !s.is_unsynced());
        for segment in &mut self.segments {
            segment.reset();
        }
        self.active = None;
        self.next = None;
        self.previous_part = None;
        self.infinite_pieces.clear();
        self.history.clear();
        self.persistent_state = None;
        self.mode = mode;

        self.prime_next();
        info!(rundown = %self.id, ?mode, next = ?self.next.as_ref().map(|c| c.part_id()), "activated");
        Ok(())
    }

    /// Point next at the first playable part
    fn prime_next(&mut self) {
        let target = self.first_playable_part().map(|p| (p.segment_id().to_string(), p.id().to_string()));
        if let Some((segment_id, part_id)) = target {
            self.mark_next(RundownCursor::new(segment_id, part_id, Owner::System));
        }
    }

    // ------------------------------------------------------------------
    // Take
    // ------------------------------------------------------------------

    /// Take the next part to air now
    pub fn take_next(&mut self) -> Result<()> {
        self.take_next_at(epoch_millis())
    }

    /// Take the next part to air at the given epoch
    pub fn take_next_at(&mut self, now: u64) -> Result<()> {
        self.require_active()?;
        let next = self
            .next
            .clone()
            .ok_or_else(|| RundownError::not_found("next part in rundown", self.id.clone()))?;
        if self.resolve(&next).is_none() {
            return Err(RundownError::not_found("part", next.part_id()));
        }

        if let Some(outgoing) = self.active_part().filter(|p| p.is_on_air()).cloned() {
            self.previous_part = Some(outgoing.clone());
            self.history.push_back(outgoing);
            while self.history.len() > HISTORY_LIMIT {
                self.history.pop_front();
            }
        }

        if let Some(active) = self.active.take() {
            self.retire(&active, next.segment_id());
        }

        let segment = self
            .segment_mut(next.segment_id())
            .ok_or_else(|| RundownError::not_found("segment", next.segment_id()))?;
        segment.unmark_as_next();
        segment.put_on_air();
        let part = segment
            .part_mut(next.part_id())
            .ok_or_else(|| RundownError::not_found("part", next.part_id()))?;
        part.unmark_as_next();
        part.put_on_air(now);

        let previous = self.previous_part.as_ref();
        if let Some(part) = find_part_mut(&mut self.segments, next.segment_id(), next.part_id()) {
            part.calculate_timings(previous);
        }
        self.active = Some(next.clone());

        self.set_next_from_active();
        self.update_infinite_pieces(now)?;

        info!(
            rundown = %self.id,
            part = %next.part_id(),
            next = ?self.next.as_ref().map(|c| c.part_id()),
            "take"
        );
        Ok(())
    }

    /// Take the outgoing part off air and drop stand-ins it leaves behind
    fn retire(&mut self, outgoing: &RundownCursor, incoming_segment_id: &str) {
        let Some(index) = self.segment_index(outgoing.segment_id()) else {
            return;
        };
        let segment = &mut self.segments[index];
        if let Some(part) = segment.part_mut(outgoing.part_id()) {
            part.take_off_air();
        }
        segment.take_off_air();

        let stripped = segment.remove_unsynced_parts();
        if !stripped.is_empty() {
            debug!(segment = %segment.id(), parts = ?stripped, "dropped unsynced parts");
        }
        if segment.is_unsynced() && segment.parts().is_empty() && segment.id() != incoming_segment_id {
            debug!(segment = %segment.id(), "dropped emptied unsynced segment");
            self.segments.remove(index);
        }
    }

    // ------------------------------------------------------------------
    // Next cursor
    // ------------------------------------------------------------------

    /// Set the next part explicitly
    pub fn set_next(&mut self, segment_id: &str, part_id: &str, owner: Owner) -> Result<()> {
        self.require_active()?;
        let part = self
            .segment(segment_id)
            .ok_or_else(|| RundownError::not_found("segment", segment_id))?
            .part(part_id)
            .ok_or_else(|| RundownError::not_found("part", part_id))?;
        if part.is_on_air() {
            return Err(RundownError::OnAir(part_id.to_string()));
        }

        if let Some(old) = self.next.clone() {
            self.unmark_next(&old);
            let is_active = self.active.as_ref().is_some_and(|a| a.part_id() == old.part_id());
            if !is_active {
                if let Some(part) = find_part_mut(&mut self.segments, old.segment_id(), old.part_id()) {
                    part.reset();
                }
            }
        }

        self.mark_next(RundownCursor::new(segment_id, part_id, owner));
        debug!(rundown = %self.id, part = %part_id, ?owner, "set next");
        Ok(())
    }

    /// Advance the next cursor to the part after the active one.
    ///
    /// Returns false when nothing follows the active part; the next cursor
    /// is then left as it was.
    pub fn set_next_from_active(&mut self) -> bool {
        let Some(active) = self.active.clone() else {
            return false;
        };
        if let Some(old) = self.next.clone() {
            self.unmark_next(&old);
        }

        match self.find_part_after(active.part_id()) {
            Ok(part) => {
                let cursor = RundownCursor::new(part.segment_id(), part.id(), Owner::System);
                self.mark_next(cursor);
                true
            }
            Err(err) => {
                debug!(rundown = %self.id, reason = %err, "no part after active");
                false
            }
        }
    }

    /// Re-point the next cursor after a structural edit
    pub(crate) fn repair_next_cursor(&mut self) {
        if !self.is_active() {
            return;
        }
        match self.next.clone() {
            Some(next) if self.resolve(&next).is_some() => {
                if !next.is_external() && self.active.is_some() {
                    self.set_next_from_active();
                } else {
                    self.refresh_next_timings();
                }
            }
            Some(next) => {
                warn!(rundown = %self.id, part = %next.part_id(), "next part vanished");
                self.next = None;
                if self.active.is_some() {
                    self.set_next_from_active();
                } else {
                    self.prime_next();
                }
            }
            None => {
                if self.active.is_some() {
                    self.set_next_from_active();
                }
            }
        }
    }

    fn mark_next(&mut self, cursor: RundownCursor) {
        if let Some(segment) = self.segment_mut(cursor.segment_id()) {
            segment.mark_as_next();
            if let Some(part) = segment.part_mut(cursor.part_id()) {
                part.mark_as_next();
            }
        }
        self.next = Some(cursor);
        self.refresh_next_timings();
    }

    fn unmark_next(&mut self, cursor: &RundownCursor) {
        if let Some(segment) = self.segment_mut(cursor.segment_id()) {
            segment.unmark_as_next();
            if let Some(part) = segment.part_mut(cursor.part_id()) {
                part.unmark_as_next();
            }
        }
    }

    /// Recompute the next part's timings against the active part
    fn refresh_next_timings(&mut self) {
        let (Some(active), Some(next)) = (self.active.clone(), self.next.clone()) else {
            return;
        };
        if active.part_id() == next.part_id() {
            return;
        }
        let active_part = self.resolve(&active).cloned();
        if let Some(part) = find_part_mut(&mut self.segments, next.segment_id(), next.part_id()) {
            part.calculate_timings(active_part.as_ref());
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    pub(super) fn require_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(RundownError::NotActivated(self.id.clone()))
        }
    }

    pub(super) fn resolve(&self, cursor: &RundownCursor) -> Option<&Part> {
        self.segment(cursor.segment_id())?.part(cursor.part_id())
    }

    pub(super) fn segment_index(&self, id: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.id() == id)
    }

    pub(super) fn segment_mut(&mut self, id: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.id() == id)
    }

    pub(super) fn sort_segments(&mut self) {
        self.segments.sort_by(|a, b| a.rank().total_cmp(&b.rank()));
    }

    /// Builder: set show style variant
    pub fn with_show_style_variant(mut self, id: impl Into<String>) -> Self {
        self.show_style_variant_id = Some(id.into());
        self
    }

    /// Builder: add segment
    pub fn with_segment(mut self, mut segment: Segment) -> Self {
        segment.set_rundown_id(self.id.clone());
        segment.adopt_parts();
        self.segments.push(segment);
        self.sort_segments();
        self
    }

    /// Builder: add several segments
    pub fn with_segments(self, segments: impl IntoIterator<Item = Segment>) -> Self {
        segments.into_iter().fold(self, Rundown::with_segment)
    }

    /// Builder: add baseline object
    pub fn with_baseline_object(mut self, object: TimelineObject) -> Self {
        self.baseline_objects.push(object);
        self
    }
}

pub(super) fn find_part_mut<'a>(
    segments: &'a mut [Segment],
    segment_id: &str,
    part_id: &str,
) -> Option<&'a mut Part> {
    segments
        .iter_mut()
        .find(|s| s.id() == segment_id)?
        .part_mut(part_id)
}
