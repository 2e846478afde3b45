// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Rundown state machine.
//!
//! Hierarchy:
//! - Rundown: the complete show, with active/next cursors
//! - Segment: a story, an ordered group of parts
//! - Part: a directly executable unit taken to air
//! - Piece: a media item on one layer, with a lifespan

mod changes;
mod continuity;
mod cursor;
mod edit;
mod part;
mod piece;
mod runtime;
mod segment;
mod state;

pub use changes::{diff_segments, ChangeEvent};
pub use cursor::{Owner, RundownCursor};
pub use part::{AutoNext, InTransition, OutTransition, Part, PartTimings};
pub use piece::{Piece, PieceLifespan, PieceTransition, SyncState, UNSYNCED_SUFFIX};
pub use runtime::{PartRuntime, PieceRuntime, RuntimeSnapshot, SegmentRuntime};
pub use segment::Segment;
pub use state::{AlreadyActiveProperties, Rundown, RundownMode, HISTORY_LIMIT};

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in epoch milliseconds
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
