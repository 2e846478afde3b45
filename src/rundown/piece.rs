// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pieces: the smallest schedulable unit of a show.
//!
//! A piece plays on one layer, lives for as long as its lifespan allows
//! and carries the timeline objects the playout device should run.

use serde::{Deserialize, Serialize};

use super::runtime::PieceRuntime;
use crate::timeline::TimelineObject;

/// Suffix marking an unsynced stand-in
pub const UNSYNCED_SUFFIX: &str = "_unsynced";

/// Append the unsynced suffix once
pub(crate) fn unsynced_id(id: &str) -> String {
    if id.ends_with(UNSYNCED_SUFFIX) {
        id.to_string()
    } else {
        format!("{}{}", id, UNSYNCED_SUFFIX)
    }
}

/// How long a piece stays on air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceLifespan {
    /// Ends with its part
    #[default]
    WithinPart,
    /// Continues until another segment is taken
    StickyUntilSegmentChange,
    /// Continues until replaced on its layer
    StickyUntilRundownChange,
    /// Continues to the end of its segment
    SpanningUntilSegmentEnd,
    /// Continues to the end of the rundown
    SpanningUntilRundownEnd,
    /// Spans its segment, then sticks for the rest of the rundown
    StartSpanningSegmentThenStickyRundown,
}

impl PieceLifespan {
    /// Lifespans searched for inside the active segment
    pub const SEGMENT_SPANNING: [PieceLifespan; 3] = [
        PieceLifespan::SpanningUntilRundownEnd,
        PieceLifespan::SpanningUntilSegmentEnd,
        PieceLifespan::StartSpanningSegmentThenStickyRundown,
    ];

    /// Lifespans searched for in earlier segments
    pub const RUNDOWN_SPANNING: [PieceLifespan; 1] = [PieceLifespan::SpanningUntilRundownEnd];

    /// Check if a piece with this lifespan can outlive its part
    pub fn is_infinite(&self) -> bool {
        match self {
            PieceLifespan::WithinPart => false,
            PieceLifespan::StickyUntilSegmentChange
            | PieceLifespan::StickyUntilRundownChange
            | PieceLifespan::SpanningUntilSegmentEnd
            | PieceLifespan::SpanningUntilRundownEnd
            | PieceLifespan::StartSpanningSegmentThenStickyRundown => true,
        }
    }
}

/// Transition role of a piece within its part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceTransition {
    /// Plays while the part transitions in
    InTransition,
    /// Plays while the part transitions out
    OutTransition,
    /// Regular content
    #[default]
    NoTransition,
}

/// Whether an entity still exists in the ingest source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Present in the source feed
    #[default]
    Live,
    /// Removed from the source while on air; kept as an inert stand-in
    Unsynced,
}

fn default_planned() -> bool {
    true
}

/// A playable element within a part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    /// Piece identifier
    id: String,
    /// Owning part
    #[serde(default)]
    part_id: String,
    /// Display name
    #[serde(default)]
    name: String,
    /// Output layer
    layer: String,
    /// Lifespan
    #[serde(default)]
    lifespan: PieceLifespan,
    /// Transition role
    #[serde(default)]
    transition: PieceTransition,
    /// Start offset within the part (ms)
    #[serde(default)]
    start: u64,
    /// Duration (None = until the part ends)
    #[serde(default)]
    duration: Option<u64>,
    /// Time the content needs before its visible start (ms)
    #[serde(default)]
    pre_roll_duration: u64,
    /// Time the content keeps running after its visible end (ms)
    #[serde(default)]
    post_roll_duration: u64,
    /// Planned in the rundown (false for ad hoc pieces)
    #[serde(default = "default_planned")]
    planned: bool,
    /// Timeline objects to play
    #[serde(default)]
    timeline_objects: Vec<TimelineObject>,
    /// Epoch (ms) the piece went on air, 0 = not executed
    #[serde(skip)]
    executed_at: u64,
    /// Offset at which the piece was stopped
    #[serde(skip)]
    stopped_at: Option<u64>,
    /// Source sync state
    #[serde(skip)]
    sync: SyncState,
}

impl Piece {
    /// Create a new piece on a layer
    pub fn new(id: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            part_id: String::new(),
            name: String::new(),
            layer: layer.into(),
            lifespan: PieceLifespan::default(),
            transition: PieceTransition::default(),
            start: 0,
            duration: None,
            pre_roll_duration: 0,
            post_roll_duration: 0,
            planned: true,
            timeline_objects: Vec::new(),
            executed_at: 0,
            stopped_at: None,
            sync: SyncState::Live,
        }
    }

    /// Get piece id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get owning part id
    pub fn part_id(&self) -> &str {
        &self.part_id
    }

    pub(crate) fn set_part_id(&mut self, part_id: impl Into<String>) {
        self.part_id = part_id.into();
    }

    /// Get name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get layer
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Get lifespan
    pub fn lifespan(&self) -> PieceLifespan {
        self.lifespan
    }

    /// Get transition role
    pub fn transition(&self) -> PieceTransition {
        self.transition
    }

    /// Get start offset
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Get duration, shortened if the piece was stopped
    pub fn duration(&self) -> Option<u64> {
        match self.stopped_at {
            Some(at) => {
                let stopped = at.saturating_sub(self.start);
                Some(self.duration.map_or(stopped, |d| d.min(stopped)))
            }
            None => self.duration,
        }
    }

    /// Get pre-roll
    pub fn pre_roll_duration(&self) -> u64 {
        self.pre_roll_duration
    }

    /// Get post-roll
    pub fn post_roll_duration(&self) -> u64 {
        self.post_roll_duration
    }

    /// Get nested timeline objects
    pub fn timeline_objects(&self) -> &[TimelineObject] {
        &self.timeline_objects
    }

    /// Check if planned
    pub fn is_planned(&self) -> bool {
        self.planned
    }

    /// Get executed-at epoch (0 = not executed)
    pub fn executed_at(&self) -> u64 {
        self.executed_at
    }

    /// Set executed-at epoch
    pub fn set_executed_at(&mut self, epoch: u64) {
        self.executed_at = epoch;
    }

    /// Mark as not executed
    pub fn reset_executed_at(&mut self) {
        self.executed_at = 0;
    }

    /// Stamp executed-at unless already set
    pub fn ensure_executed_at(&mut self, epoch: u64) {
        if self.executed_at == 0 {
            self.executed_at = epoch;
        }
    }

    /// Check if unsynced
    pub fn is_unsynced(&self) -> bool {
        self.sync == SyncState::Unsynced
    }

    /// Get sync state
    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    /// Mark unsynced in place
    pub fn mark_as_unsynced(&mut self) {
        self.sync = SyncState::Unsynced;
    }

    /// Inert stand-in with suffixed ids
    pub fn unsynced_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = unsynced_id(&self.id);
        copy.part_id = unsynced_id(&self.part_id);
        copy.sync = SyncState::Unsynced;
        copy
    }

    /// Stop the piece at an offset within its part
    pub fn stop(&mut self, at: u64) {
        if at >= self.start {
            self.stopped_at = Some(at);
        }
    }

    /// Check if the piece was stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Clear runtime state
    pub fn reset(&mut self) {
        self.executed_at = 0;
        self.stopped_at = None;
    }

    pub(crate) fn runtime(&self) -> PieceRuntime {
        PieceRuntime {
            executed_at: self.executed_at,
            stopped_at: self.stopped_at,
            sync: self.sync,
        }
    }

    pub(crate) fn apply_runtime(&mut self, runtime: &PieceRuntime) {
        self.executed_at = runtime.executed_at;
        self.stopped_at = runtime.stopped_at;
        self.sync = runtime.sync;
    }

    /// Builder: set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set lifespan
    pub fn with_lifespan(mut self, lifespan: PieceLifespan) -> Self {
        self.lifespan = lifespan;
        self
    }

    /// Builder: set transition role
    pub fn with_transition(mut self, transition: PieceTransition) -> Self {
        self.transition = transition;
        self
    }

    /// Builder: set start offset
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    /// Builder: set duration
    pub fn with_duration(mut self, duration: u64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Builder: set pre-roll
    pub fn with_pre_roll(mut self, pre_roll: u64) -> Self {
        self.pre_roll_duration = pre_roll;
        self
    }

    /// Builder: set post-roll
    pub fn with_post_roll(mut self, post_roll: u64) -> Self {
        self.post_roll_duration = post_roll;
        self
    }

    /// Builder: add a timeline object
    pub fn with_object(mut self, object: TimelineObject) -> Self {
        self.timeline_objects.push(object);
        self
    }

    /// Builder: mark as ad hoc
    pub fn unplanned(mut self) -> Self {
        self.planned = false;
        self
    }

    /// Builder: set owning part
    pub fn with_part(mut self, part_id: impl Into<String>) -> Self {
        self.part_id = part_id.into();
        self
    }
}
