// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Structural edits and ad hoc playout actions.
//!
//! Edits may arrive while the rundown is on air. The part on air is never
//! removed out from under playout: it stays as an unsynced stand-in until
//! the next take moves away from it. After every edit the next cursor is
//! repaired and orphaned infinite pieces are replaced by unsynced copies.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::cursor::RundownCursor;
use super::epoch_millis;
use super::part::Part;
use super::piece::Piece;
use super::segment::Segment;
use super::state::Rundown;
use crate::error::{Result, RundownError};

impl Rundown {
    /// Add a segment in rank order
    pub fn add_segment(&mut self, mut segment: Segment) -> Result<()> {
        if self.segment(segment.id()).is_some() {
            return Err(RundownError::UnsupportedOperation(format!(
                "segment {} already exists",
                segment.id()
            )));
        }
        segment.set_rundown_id(self.id().to_string());
        segment.adopt_parts();
        debug!(rundown = %self.id(), segment = %segment.id(), "segment added");
        self.segments.push(segment);
        self.sort_segments();
        self.repair_next_cursor();
        Ok(())
    }

    /// Replace a segment, keeping runtime state of its parts
    pub fn update_segment(&mut self, mut segment: Segment) -> Result<()> {
        let index = self
            .segment_index(segment.id())
            .ok_or_else(|| RundownError::not_found("segment", segment.id()))?;
        segment.set_rundown_id(self.id().to_string());
        segment.adopt_parts();
        segment.adopt_runtime(&self.segments[index]);
        debug!(rundown = %self.id(), segment = %segment.id(), "segment updated");
        self.segments[index] = segment;
        self.sort_segments();
        self.replace_orphaned_infinite_pieces();
        self.repair_next_cursor();
        Ok(())
    }

    /// Remove a segment.
    ///
    /// The segment on air is kept as an unsynced copy holding only its
    /// on-air part, and the active cursor follows it.
    pub fn remove_segment(&mut self, segment_id: &str) -> Result<()> {
        let index = self
            .segment_index(segment_id)
            .ok_or_else(|| RundownError::not_found("segment", segment_id))?;
        let mut segment = self.segments.remove(index);

        let on_air = self
            .active
            .as_ref()
            .is_some_and(|a| a.segment_id() == segment_id);
        if on_air {
            segment.mark_as_unsynced();
            let copy = segment.unsynced_copy();
            let owner = self.active.as_ref().map(RundownCursor::owner);
            self.active = match (copy.on_air_part(), owner) {
                (Some(part), Some(owner)) => Some(RundownCursor::new(copy.id(), part.id(), owner)),
                _ => None,
            };
            warn!(rundown = %self.id(), segment = %segment_id, "on-air segment removed, kept unsynced");
            self.segments.push(copy);
            self.sort_segments();
        } else {
            debug!(rundown = %self.id(), segment = %segment_id, "segment removed");
        }

        self.replace_orphaned_infinite_pieces();
        self.repair_next_cursor();
        Ok(())
    }

    /// Add a part to a segment
    pub fn add_part(&mut self, segment_id: &str, part: Part) -> Result<()> {
        self.segment_mut(segment_id)
            .ok_or_else(|| RundownError::not_found("segment", segment_id))?
            .insert_part(part)?;
        self.repair_next_cursor();
        Ok(())
    }

    /// Replace a part, keeping its runtime state
    pub fn update_part(&mut self, segment_id: &str, part: Part) -> Result<()> {
        self.segment_mut(segment_id)
            .ok_or_else(|| RundownError::not_found("segment", segment_id))?
            .update_part(part)?;
        self.replace_orphaned_infinite_pieces();
        self.repair_next_cursor();
        Ok(())
    }

    /// Remove a part; a part on air is marked unsynced in place instead
    pub fn remove_part_from_segment(&mut self, segment_id: &str, part_id: &str) -> Result<()> {
        let segment = self
            .segment_mut(segment_id)
            .ok_or_else(|| RundownError::not_found("segment", segment_id))?;
        let part = segment
            .part_mut(part_id)
            .ok_or_else(|| RundownError::not_found("part", part_id))?;
        if part.is_on_air() {
            part.mark_as_unsynced();
            warn!(segment = %segment_id, part = %part_id, "on-air part removed, kept unsynced");
        } else {
            segment.remove_part(part_id)?;
        }

        self.replace_orphaned_infinite_pieces();
        self.repair_next_cursor();
        Ok(())
    }

    /// Insert an ad hoc piece into the active part now
    pub fn insert_adlib_piece(&mut self, piece: Piece) -> Result<()> {
        self.insert_adlib_piece_at(piece, epoch_millis())
    }

    /// Insert an ad hoc piece into the active part at the given epoch
    pub fn insert_adlib_piece_at(&mut self, piece: Piece, now: u64) -> Result<()> {
        self.require_active()?;
        let active = self
            .active
            .clone()
            .ok_or_else(|| RundownError::not_found("active part in rundown", self.id().to_string()))?;

        let mut piece = piece.unplanned();
        piece.set_executed_at(now);
        let part = self
            .segment_mut(active.segment_id())
            .and_then(|s| s.part_mut(active.part_id()))
            .ok_or_else(|| RundownError::not_found("part", active.part_id()))?;
        if part.piece(piece.id()).is_some() {
            return Err(RundownError::UnsupportedOperation(format!(
                "piece {} already exists in part {}",
                piece.id(),
                active.part_id()
            )));
        }
        info!(part = %active.part_id(), piece = %piece.id(), layer = %piece.layer(), "adlib piece");
        part.insert_piece(piece);

        self.update_infinite_pieces(now)
    }

    /// Replace a piece in the active or next part
    pub fn replace_piece(&mut self, part_id: &str, piece: Piece) -> Result<()> {
        self.require_active()?;
        let is_active = self.active.as_ref().is_some_and(|c| c.part_id() == part_id);
        let is_next = self.next.as_ref().is_some_and(|c| c.part_id() == part_id);
        if !is_active && !is_next {
            return Err(RundownError::UnsupportedOperation(format!(
                "part {} is neither active nor next",
                part_id
            )));
        }

        let segment = self
            .segments
            .iter_mut()
            .find(|s| s.part(part_id).is_some())
            .ok_or_else(|| RundownError::not_found("part", part_id))?;
        let part = segment
            .part_mut(part_id)
            .ok_or_else(|| RundownError::not_found("part", part_id))?;
        let executed_at = part.piece(piece.id()).map_or(0, Piece::executed_at);
        let mut piece = piece;
        if executed_at != 0 {
            piece.set_executed_at(executed_at);
        }
        part.replace_piece(piece)?;

        if is_active {
            let now = part.executed_at().max(executed_at);
            self.update_infinite_pieces(now)?;
        }
        Ok(())
    }

    /// Queue an ad hoc part directly after the active part
    pub fn insert_part_after_active(&mut self, part: Part) -> Result<()> {
        self.require_active()?;
        let active = self
            .active
            .clone()
            .ok_or_else(|| RundownError::not_found("active part in rundown", self.id().to_string()))?;
        let part_id = part.id().to_string();
        self.segment_mut(active.segment_id())
            .ok_or_else(|| RundownError::not_found("segment", active.segment_id()))?
            .insert_part_after_active_part(part.unplanned())?;

        self.set_next_from_active();
        info!(rundown = %self.id(), part = %part_id, "adlib part queued");
        Ok(())
    }

    /// Stop pieces on the given layers now
    pub fn stop_pieces_on_layers(&mut self, layers: &BTreeSet<String>) -> Result<()> {
        self.stop_pieces_on_layers_at(layers, epoch_millis())
    }

    /// Stop pieces on the given layers at the given epoch.
    ///
    /// Pieces in the active part get a stop offset; infinite pieces on
    /// those layers are dropped from the continuity map.
    pub fn stop_pieces_on_layers_at(&mut self, layers: &BTreeSet<String>, now: u64) -> Result<()> {
        self.require_active()?;
        let active = self
            .active
            .clone()
            .ok_or_else(|| RundownError::not_found("active part in rundown", self.id().to_string()))?;
        let part = self
            .segment_mut(active.segment_id())
            .and_then(|s| s.part_mut(active.part_id()))
            .ok_or_else(|| RundownError::not_found("part", active.part_id()))?;

        let offset = now.saturating_sub(part.executed_at());
        let ids: Vec<String> = part
            .pieces()
            .iter()
            .filter(|p| layers.contains(p.layer()) && !p.is_stopped())
            .map(|p| p.id().to_string())
            .collect();
        for id in &ids {
            if let Some(piece) = part.piece_mut(id) {
                piece.stop(offset);
            }
        }

        let ended: Vec<(String, String)> = self
            .infinite_pieces
            .values()
            .filter(|p| layers.contains(p.layer()) && p.part_id() != active.part_id())
            .map(|p| (p.part_id().to_string(), p.id().to_string()))
            .collect();
        for (part_id, piece_id) in &ended {
            if let Some(piece) = self.piece_mut(part_id, piece_id) {
                piece.reset_executed_at();
            }
        }
        self.infinite_pieces
            .retain(|layer, p| !layers.contains(layer) || p.part_id() == active.part_id());
        for entry in self
            .infinite_pieces
            .values_mut()
            .filter(|p| p.part_id() == active.part_id() && ids.iter().any(|id| id == p.id()))
        {
            entry.stop(offset);
        }

        debug!(rundown = %self.id(), stopped = ?ids, ended = ?ended, "stopped layers");
        Ok(())
    }
}
