// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Infinite-piece continuity.
//!
//! After every take the rundown rebuilds its layer -> piece map of pieces
//! that outlive their part. The active part seeds the map, surviving
//! sticky pieces fill empty layers, then spanning pieces are found by
//! walking backwards through the active segment and then earlier segments.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::piece::{Piece, PieceLifespan};
use super::state::Rundown;
use crate::error::{Result, RundownError};

impl Rundown {
    /// Rebuild the infinite-piece map around the active part
    pub fn update_infinite_pieces(&mut self, now: u64) -> Result<()> {
        let Some(active) = self.active.clone() else {
            return Ok(());
        };
        let active_part = self
            .resolve(&active)
            .ok_or_else(|| RundownError::not_found("part", active.part_id()))?;

        let mut layers: BTreeMap<String, Piece> = active_part
            .pieces()
            .iter()
            .map(|p| (p.layer().to_string(), p.clone()))
            .collect();
        let seeded: BTreeSet<String> = layers.keys().cloned().collect();

        for piece in self.infinite_pieces.values() {
            if seeded.contains(piece.layer()) || self.is_outlived(piece, active.segment_id()) {
                continue;
            }
            if layers.insert(piece.layer().to_string(), piece.clone()).is_some() {
                return Err(RundownError::UnsupportedOperation(format!(
                    "two infinite pieces survive on layer {}",
                    piece.layer()
                )));
            }
        }

        let mut spanning: Vec<Piece> = Vec::new();
        let segment_index = self
            .segment_index(active.segment_id())
            .ok_or_else(|| RundownError::not_found("segment", active.segment_id()))?;
        {
            let mut known: BTreeSet<String> = layers.keys().cloned().collect();
            let found = self.segments[segment_index]
                .get_first_spanning_piece_for_each_layer_before_part(active.part_id(), &known)?;
            for piece in found {
                known.insert(piece.layer().to_string());
                spanning.push(piece.clone());
            }
            for segment in self.segments[..segment_index].iter().rev() {
                for piece in segment.get_first_spanning_rundown_piece_for_each_layer_for_all_parts(&known) {
                    spanning.push(piece.clone());
                }
                known.extend(spanning.iter().map(|p| p.layer().to_string()));
            }
        }

        let mut stamps: Vec<(String, String, u64)> = Vec::new();
        for mut piece in spanning {
            let tracked = self
                .infinite_pieces
                .get(piece.layer())
                .filter(|p| p.id() == piece.id())
                .map(Piece::executed_at)
                .filter(|at| *at != 0);
            match tracked {
                Some(at) => piece.set_executed_at(at),
                None => piece.ensure_executed_at(now),
            }
            stamps.push((piece.part_id().to_string(), piece.id().to_string(), piece.executed_at()));
            layers.insert(piece.layer().to_string(), piece);
        }

        let dropped: Vec<(String, String)> = self
            .infinite_pieces
            .values()
            .filter(|old| layers.get(old.layer()).map_or(true, |p| p.id() != old.id()))
            .map(|old| (old.part_id().to_string(), old.id().to_string()))
            .collect();

        for (part_id, piece_id, at) in stamps {
            if let Some(piece) = self.piece_mut(&part_id, &piece_id) {
                piece.set_executed_at(at);
            }
        }
        for (part_id, piece_id) in &dropped {
            if let Some(piece) = self.piece_mut(part_id, piece_id) {
                piece.reset_executed_at();
            }
        }
        if !dropped.is_empty() {
            debug!(rundown = %self.id(), pieces = ?dropped, "infinite pieces ended");
        }

        layers.retain(|_, p| p.lifespan().is_infinite());
        self.infinite_pieces = layers;
        Ok(())
    }

    /// Swap map entries whose owning part vanished for unsynced copies
    pub(crate) fn replace_orphaned_infinite_pieces(&mut self) {
        let orphaned: Vec<(String, bool)> = self
            .infinite_pieces
            .iter()
            .filter(|(_, p)| !p.is_unsynced())
            .filter_map(|(layer, p)| match self.find_part(p.part_id()) {
                None => Some((layer.clone(), false)),
                Some(part) if part.is_unsynced() => Some((layer.clone(), true)),
                Some(_) => None,
            })
            .collect();

        for (layer, owner_kept) in orphaned {
            if let Some(piece) = self.infinite_pieces.get_mut(&layer) {
                if owner_kept {
                    piece.mark_as_unsynced();
                } else {
                    *piece = piece.unsynced_copy();
                }
                debug!(layer = %layer, piece = %piece.id(), "infinite piece unsynced");
            }
        }
    }

    fn is_outlived(&self, piece: &Piece, active_segment_id: &str) -> bool {
        match piece.lifespan() {
            PieceLifespan::WithinPart => true,
            PieceLifespan::StickyUntilRundownChange => false,
            PieceLifespan::StartSpanningSegmentThenStickyRundown => false,
            PieceLifespan::StickyUntilSegmentChange => self
                .segments
                .iter()
                .find(|s| s.part(piece.part_id()).is_some())
                .map_or(true, |s| s.id() != active_segment_id),
            PieceLifespan::SpanningUntilSegmentEnd | PieceLifespan::SpanningUntilRundownEnd => true,
        }
    }

    pub(super) fn piece_mut(&mut self, part_id: &str, piece_id: &str) -> Option<&mut Piece> {
        self.segments
            .iter_mut()
            .find_map(|s| s.part_mut(part_id))?
            .piece_mut(piece_id)
    }
}
