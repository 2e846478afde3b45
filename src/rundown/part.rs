// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Parts: ordered lists of pieces that are taken on air together.
//!
//! A part knows how it wants to be entered (in-transition, pre-roll),
//! how it wants to be left (out-transition, post-roll) and whether it
//! advances automatically. `calculate_timings` folds all of that together
//! with the outgoing part into the offsets the timeline builder uses.

use serde::{Deserialize, Serialize};

use super::piece::{unsynced_id, Piece, PieceLifespan, PieceTransition, SyncState};
use super::runtime::PartRuntime;
use crate::error::{Result, RundownError};

/// Automatic advance to the next part when this one ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoNext {
    /// How much the next part overlaps the end of this one (ms)
    #[serde(default)]
    pub overlap: u64,
}

/// How a part transitions in from its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InTransition {
    /// How long the previous part keeps playing under the transition
    #[serde(default)]
    pub previous_part_keep_alive_duration: u64,
    /// Delay before this part's content starts
    #[serde(default)]
    pub part_content_delay_duration: u64,
}

/// How a part transitions out to its successor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutTransition {
    /// Length of the out-transition (ms)
    #[serde(default)]
    pub duration: u64,
}

/// Offsets computed when a part is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartTimings {
    /// Start of in-transition pieces, None = no in-transition this take
    pub in_transition_start: Option<u64>,
    /// Delay applied to planned pieces
    pub delay_start_of_pieces_duration: u64,
    /// Longest post-roll of this part's pieces
    pub post_roll_duration: u64,
    /// How long the previous part keeps running into this one
    pub previous_part_continue_into_part_duration: u64,
    /// Lead time for out-transition pieces, None = no out-transition
    pub keep_alive_duration: Option<u64>,
}

impl PartTimings {
    /// Compute timings for `part` taken after `previous`
    pub fn calculate(previous: Option<&Part>, part: &Part) -> Self {
        let to_part_pre_roll = part.max_pre_roll();
        let to_part_post_roll = part.max_post_roll();
        let from_part_post_roll = previous.map_or(0, |p| p.max_post_roll());
        let out_transition_duration = previous
            .and_then(|p| p.out_transition)
            .map_or(0, |t| t.duration);
        let overlap = previous.and_then(|p| p.auto_next).map_or(0, |a| a.overlap);
        let keep_alive_duration = part.out_transition.map(|t| t.duration);

        let in_transition = match previous {
            Some(prev) if !prev.disable_next_in_transition => part.in_transition,
            _ => None,
        };

        match in_transition {
            None => {
                let take_offset =
                    out_transition_duration.max(to_part_pre_roll.saturating_sub(overlap));
                Self {
                    in_transition_start: None,
                    delay_start_of_pieces_duration: take_offset,
                    post_roll_duration: to_part_post_roll,
                    previous_part_continue_into_part_duration: take_offset + from_part_post_roll,
                    keep_alive_duration,
                }
            }
            Some(transition) => {
                let keep_alive = transition.previous_part_keep_alive_duration;
                let content_delay = transition.part_content_delay_duration;

                let out_transition_time = out_transition_duration.saturating_sub(keep_alive);
                let pre_roll = content_delay.max(to_part_pre_roll);
                let pre_roll_time = pre_roll - content_delay;
                let take_offset = out_transition_time.max(pre_roll_time);

                Self {
                    in_transition_start: Some(take_offset),
                    delay_start_of_pieces_duration: take_offset + content_delay,
                    post_roll_duration: to_part_post_roll,
                    previous_part_continue_into_part_duration: take_offset
                        + keep_alive
                        + from_part_post_roll,
                    keep_alive_duration,
                }
            }
        }
    }
}

fn default_planned() -> bool {
    true
}

/// A directly executable unit of the show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Part identifier
    id: String,
    /// Owning segment
    #[serde(default)]
    segment_id: String,
    /// Display name
    #[serde(default)]
    name: String,
    /// Sort rank within the segment
    #[serde(default)]
    rank: f64,
    /// Pieces in play order
    #[serde(default)]
    pieces: Vec<Piece>,
    /// Planned in the rundown (false for ad hoc parts)
    #[serde(default = "default_planned")]
    planned: bool,
    /// Expected on-air duration (ms)
    #[serde(default)]
    expected_duration: Option<u64>,
    /// Auto-advance configuration
    #[serde(default)]
    auto_next: Option<AutoNext>,
    /// In-transition configuration
    #[serde(default)]
    in_transition: Option<InTransition>,
    /// Out-transition configuration
    #[serde(default)]
    out_transition: Option<OutTransition>,
    /// Suppress the in-transition of whatever follows
    #[serde(default)]
    disable_next_in_transition: bool,
    #[serde(skip)]
    on_air: bool,
    #[serde(skip)]
    next: bool,
    #[serde(skip)]
    executed_at: u64,
    #[serde(skip)]
    timings: PartTimings,
    #[serde(skip)]
    sync: SyncState,
}

impl Part {
    /// Create a new empty part
    pub fn new(id: impl Into<String>, rank: f64) -> Self {
        Self {
            id: id.into(),
            segment_id: String::new(),
            name: String::new(),
            rank,
            pieces: Vec::new(),
            planned: true,
            expected_duration: None,
            auto_next: None,
            in_transition: None,
            out_transition: None,
            disable_next_in_transition: false,
            on_air: false,
            next: false,
            executed_at: 0,
            timings: PartTimings::default(),
            sync: SyncState::Live,
        }
    }

    /// Get part id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get owning segment id
    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    pub(crate) fn set_segment_id(&mut self, segment_id: impl Into<String>) {
        self.segment_id = segment_id.into();
    }

    /// Get name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get rank
    pub fn rank(&self) -> f64 {
        self.rank
    }

    pub(crate) fn set_rank(&mut self, rank: f64) {
        self.rank = rank;
    }

    /// Get expected duration
    pub fn expected_duration(&self) -> Option<u64> {
        self.expected_duration
    }

    /// Get auto-next configuration
    pub fn auto_next(&self) -> Option<AutoNext> {
        self.auto_next
    }

    /// Get in-transition configuration
    pub fn in_transition(&self) -> Option<InTransition> {
        self.in_transition
    }

    /// Get out-transition configuration
    pub fn out_transition(&self) -> Option<OutTransition> {
        self.out_transition
    }

    /// Check if planned
    pub fn is_planned(&self) -> bool {
        self.planned
    }

    /// Check if on air
    pub fn is_on_air(&self) -> bool {
        self.on_air
    }

    /// Put on air at `now`, stamping pieces that have not executed yet
    pub fn put_on_air(&mut self, now: u64) {
        self.on_air = true;
        self.executed_at = now;
        for piece in &mut self.pieces {
            piece.ensure_executed_at(now);
        }
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

    /// Get executed-at epoch (0 = never taken)
    pub fn executed_at(&self) -> u64 {
        self.executed_at
    }

    /// Set executed-at epoch
    pub fn set_executed_at(&mut self, epoch: u64) {
        self.executed_at = epoch;
    }

    /// Mark as never taken
    pub fn reset_executed_at(&mut self) {
        self.executed_at = 0;
    }

    /// Check if unsynced
    pub fn is_unsynced(&self) -> bool {
        self.sync == SyncState::Unsynced
    }

    /// Mark unsynced in place, pieces included
    pub fn mark_as_unsynced(&mut self) {
        self.sync = SyncState::Unsynced;
        for piece in &mut self.pieces {
            piece.mark_as_unsynced();
        }
    }

    /// Inert stand-in with suffixed ids
    pub fn unsynced_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = unsynced_id(&self.id);
        copy.sync = SyncState::Unsynced;
        copy.pieces = self.pieces.iter().map(Piece::unsynced_copy).collect();
        copy
    }

    /// Clear runtime state
    pub fn reset(&mut self) {
        self.on_air = false;
        self.next = false;
        self.executed_at = 0;
        self.timings = PartTimings::default();
        for piece in &mut self.pieces {
            piece.reset();
        }
    }

    /// Carry runtime state over from a previous version of this part
    pub(crate) fn adopt_runtime(&mut self, old: &Part) {
        self.on_air = old.on_air;
        self.next = old.next;
        self.executed_at = old.executed_at;
        self.timings = old.timings;
        for piece in &mut self.pieces {
            if let Some(previous) = old.piece(piece.id()) {
                piece.set_executed_at(previous.executed_at());
            }
        }
    }

    pub(crate) fn runtime(&self) -> PartRuntime {
        PartRuntime {
            on_air: self.on_air,
            next: self.next,
            executed_at: self.executed_at,
            timings: self.timings,
            sync: self.sync,
            pieces: self.pieces.iter().map(|p| (p.id().to_string(), p.runtime())).collect(),
        }
    }

    /// Overwrite runtime state; pieces without an entry are left alone
    pub(crate) fn apply_runtime(&mut self, runtime: &PartRuntime) {
        self.on_air = runtime.on_air;
        self.next = runtime.next;
        self.executed_at = runtime.executed_at;
        self.timings = runtime.timings;
        self.sync = runtime.sync;
        for piece in &mut self.pieces {
            if let Some(state) = runtime.pieces.get(piece.id()) {
                piece.apply_runtime(state);
            }
        }
    }

    /// Recompute timings against the outgoing part
    pub fn calculate_timings(&mut self, previous: Option<&Part>) {
        self.timings = PartTimings::calculate(previous, self);
    }

    /// Get computed timings
    pub fn timings(&self) -> &PartTimings {
        &self.timings
    }

    /// Get pieces
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Get pieces with one of the given lifespans
    pub fn pieces_with_lifespan<'a>(
        &'a self,
        lifespans: &'a [PieceLifespan],
    ) -> impl Iterator<Item = &'a Piece> + 'a {
        self.pieces
            .iter()
            .filter(move |p| lifespans.contains(&p.lifespan()))
    }

    /// Get piece by id
    pub fn piece(&self, id: &str) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id() == id)
    }

    /// Get mutable piece by id
    pub fn piece_mut(&mut self, id: &str) -> Option<&mut Piece> {
        self.pieces.iter_mut().find(|p| p.id() == id)
    }

    /// Add a piece, taking ownership of it
    pub fn insert_piece(&mut self, mut piece: Piece) {
        piece.set_part_id(self.id.clone());
        self.pieces.push(piece);
    }

    /// Replace a piece with the same id
    pub fn replace_piece(&mut self, mut piece: Piece) -> Result<()> {
        let slot = self
            .pieces
            .iter_mut()
            .find(|p| p.id() == piece.id())
            .ok_or_else(|| RundownError::not_found("piece", piece.id()))?;
        piece.set_part_id(self.id.clone());
        *slot = piece;
        Ok(())
    }

    /// Stop all pieces running at offset `at`
    pub fn stop(&mut self, at: u64) {
        for piece in &mut self.pieces {
            piece.stop(at);
        }
    }

    fn max_pre_roll(&self) -> u64 {
        self.pieces
            .iter()
            .filter(|p| p.transition() == PieceTransition::NoTransition && p.start() == 0)
            .map(Piece::pre_roll_duration)
            .max()
            .unwrap_or(0)
    }

    fn max_post_roll(&self) -> u64 {
        self.pieces
            .iter()
            .filter(|p| p.transition() == PieceTransition::NoTransition)
            .map(Piece::post_roll_duration)
            .max()
            .unwrap_or(0)
    }

    /// Attach pieces deserialized without an owner
    pub(crate) fn adopt_pieces(&mut self) {
        for piece in &mut self.pieces {
            piece.set_part_id(self.id.clone());
        }
    }

    /// Builder: set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: add piece
    pub fn with_piece(mut self, piece: Piece) -> Self {
        self.insert_piece(piece);
        self
    }

    /// Builder: set expected duration
    pub fn with_expected_duration(mut self, duration: u64) -> Self {
        self.expected_duration = Some(duration);
        self
    }

    /// Builder: enable auto-next with overlap
    pub fn with_auto_next(mut self, overlap: u64) -> Self {
        self.auto_next = Some(AutoNext { overlap });
        self
    }

    /// Builder: set in-transition
    pub fn with_in_transition(mut self, keep_alive: u64, content_delay: u64) -> Self {
        self.in_transition = Some(InTransition {
            previous_part_keep_alive_duration: keep_alive,
            part_content_delay_duration: content_delay,
        });
        self
    }

    /// Builder: set out-transition
    pub fn with_out_transition(mut self, duration: u64) -> Self {
        self.out_transition = Some(OutTransition { duration });
        self
    }

    /// Builder: suppress the next part's in-transition
    pub fn without_next_in_transition(mut self) -> Self {
        self.disable_next_in_transition = true;
        self
    }

    /// Builder: mark as ad hoc
    pub fn unplanned(mut self) -> Self {
        self.planned = false;
        self
    }

    /// Builder: set owning segment
    pub fn with_segment(mut self, segment_id: impl Into<String>) -> Self {
        self.segment_id = segment_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_creation() {
        let part = Part::new("p1", 1.0).with_piece(Piece::new("a", "cam"));
        assert_eq!(part.id(), "p1");
        assert_eq!(part.pieces().len(), 1);
        assert_eq!(part.pieces()[0].part_id(), "p1");
        assert!(part.is_planned());
        assert!(!part.is_on_air());
    }

    #[test]
    fn test_put_on_air_stamps_pieces() {
        let mut part = Part::new("p1", 1.0)
            .with_piece(Piece::new("a", "cam"))
            .with_piece(Piece::new("b", "gfx"));
        part.piece_mut("b").unwrap().set_executed_at(50);

        part.put_on_air(100);
        assert!(part.is_on_air());
        assert_eq!(part.executed_at(), 100);
        assert_eq!(part.piece("a").unwrap().executed_at(), 100);
        assert_eq!(part.piece("b").unwrap().executed_at(), 50);
    }

    #[test]
    fn test_reset_clears_runtime() {
        let mut part = Part::new("p1", 1.0).with_piece(Piece::new("a", "cam"));
        part.put_on_air(100);
        part.mark_as_next();
        part.reset();
        assert!(!part.is_on_air());
        assert!(!part.is_next());
        assert_eq!(part.executed_at(), 0);
        assert_eq!(part.pieces()[0].executed_at(), 0);
    }

    #[test]
    fn test_unsynced_copy() {
        let part = Part::new("p1", 1.0).with_piece(Piece::new("a", "cam"));
        let copy = part.unsynced_copy();
        assert_eq!(copy.id(), "p1_unsynced");
        assert!(copy.is_unsynced());
        assert_eq!(copy.pieces()[0].id(), "a_unsynced");
        assert_eq!(copy.pieces()[0].part_id(), "p1_unsynced");
        assert!(copy.pieces()[0].is_unsynced());
    }

    #[test]
    fn test_replace_piece() {
        let mut part = Part::new("p1", 1.0).with_piece(Piece::new("a", "cam"));
        part.replace_piece(Piece::new("a", "gfx")).unwrap();
        assert_eq!(part.piece("a").unwrap().layer(), "gfx");

        let err = part.replace_piece(Piece::new("missing", "gfx")).unwrap_err();
        assert!(matches!(err, RundownError::NotFound { .. }));
    }

    #[test]
    fn test_timings_first_take_uses_pre_roll() {
        let mut part = Part::new("p1", 1.0)
            .with_piece(Piece::new("a", "cam").with_pre_roll(5))
            .with_piece(Piece::new("b", "gfx").with_start(1000).with_pre_roll(80));
        part.calculate_timings(None);

        let timings = part.timings();
        assert_eq!(timings.in_transition_start, None);
        assert_eq!(timings.delay_start_of_pieces_duration, 5);
        assert_eq!(timings.previous_part_continue_into_part_duration, 5);
    }

    #[test]
    fn test_timings_with_in_transition() {
        let previous = Part::new("p0", 0.0)
            .with_piece(Piece::new("x", "cam").with_post_roll(20))
            .with_out_transition(30);
        let mut part = Part::new("p1", 1.0)
            .with_in_transition(50, 10)
            .with_piece(Piece::new("a", "cam"));
        part.calculate_timings(Some(&previous));

        let timings = part.timings();
        // Out-transition (30) fits inside the keep-alive (50)
        assert_eq!(timings.in_transition_start, Some(0));
        assert_eq!(timings.delay_start_of_pieces_duration, 10);
        assert_eq!(timings.previous_part_continue_into_part_duration, 70);
    }

    #[test]
    fn test_timings_in_transition_suppressed() {
        let previous = Part::new("p0", 0.0).without_next_in_transition();
        let mut part = Part::new("p1", 1.0).with_in_transition(50, 10);
        part.calculate_timings(Some(&previous));
        assert_eq!(part.timings().in_transition_start, None);
        assert_eq!(part.timings().delay_start_of_pieces_duration, 0);
    }

    #[test]
    fn test_timings_auto_next_overlap() {
        let previous = Part::new("p0", 0.0).with_auto_next(30);
        let mut part = Part::new("p1", 1.0).with_piece(Piece::new("a", "cam").with_pre_roll(40));
        part.calculate_timings(Some(&previous));
        assert_eq!(part.timings().delay_start_of_pieces_duration, 10);
    }

    #[test]
    fn test_keep_alive_from_out_transition() {
        let mut part = Part::new("p1", 1.0).with_out_transition(25);
        part.calculate_timings(None);
        assert_eq!(part.timings().keep_alive_duration, Some(25));
    }

    #[test]
    fn test_pieces_with_lifespan() {
        let part = Part::new("p1", 1.0)
            .with_piece(Piece::new("a", "cam"))
            .with_piece(Piece::new("b", "gfx").with_lifespan(PieceLifespan::SpanningUntilRundownEnd));
        let spanning: Vec<_> = part
            .pieces_with_lifespan(&PieceLifespan::RUNDOWN_SPANNING)
            .map(|p| p.id())
            .collect();
        assert_eq!(spanning, vec!["b"]);
    }
}
