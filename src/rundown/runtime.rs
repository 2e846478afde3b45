// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playout state that show documents never carry.
//!
//! On-air flags, executed-at stamps, timings and sync state are skipped
//! when segments, parts and pieces are serialized. A [`RuntimeSnapshot`]
//! holds them by id so a stored rundown can be reloaded mid-show.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::part::PartTimings;
use super::piece::SyncState;

/// Runtime state of one piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PieceRuntime {
    #[serde(default)]
    pub executed_at: u64,
    #[serde(default)]
    pub stopped_at: Option<u64>,
    #[serde(default)]
    pub sync: SyncState,
}

/// Runtime state of one part and its pieces
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartRuntime {
    #[serde(default)]
    pub on_air: bool,
    #[serde(default)]
    pub next: bool,
    #[serde(default)]
    pub executed_at: u64,
    #[serde(default)]
    pub timings: PartTimings,
    #[serde(default)]
    pub sync: SyncState,
    /// Keyed by piece id
    #[serde(default)]
    pub pieces: BTreeMap<String, PieceRuntime>,
}

/// Runtime state of one segment and its parts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentRuntime {
    #[serde(default)]
    pub on_air: bool,
    #[serde(default)]
    pub next: bool,
    #[serde(default)]
    pub sync: SyncState,
    /// Keyed by part id
    #[serde(default)]
    pub parts: BTreeMap<String, PartRuntime>,
}

/// Everything a serialized rundown loses
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    /// Keyed by segment id
    #[serde(default)]
    pub segments: BTreeMap<String, SegmentRuntime>,
    #[serde(default)]
    pub previous_part: Option<PartRuntime>,
    /// Same order as the take history
    #[serde(default)]
    pub history: Vec<PartRuntime>,
    /// Keyed by layer
    #[serde(default)]
    pub infinite_pieces: BTreeMap<String, PieceRuntime>,
}
