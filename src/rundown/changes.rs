// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Ingest change events.
//!
//! Structural edits reach a live rundown as `ChangeEvent`s. A reloaded show
//! file is turned into events by diffing its segments against the live ones.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::part::Part;
use super::segment::Segment;
use super::state::Rundown;
use crate::error::Result;

/// A structural edit to apply to a rundown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    SegmentCreated { segment: Segment },
    SegmentUpdated { segment: Segment },
    SegmentDeleted { segment_id: String },
    PartCreated { segment_id: String, part: Part },
    PartUpdated { segment_id: String, part: Part },
    PartDeleted { segment_id: String, part_id: String },
}

impl ChangeEvent {
    /// Id of the segment this event touches
    pub fn segment_id(&self) -> &str {
        match self {
            ChangeEvent::SegmentCreated { segment } | ChangeEvent::SegmentUpdated { segment } => {
                segment.id()
            }
            ChangeEvent::SegmentDeleted { segment_id }
            | ChangeEvent::PartCreated { segment_id, .. }
            | ChangeEvent::PartUpdated { segment_id, .. }
            | ChangeEvent::PartDeleted { segment_id, .. } => segment_id,
        }
    }
}

impl Rundown {
    /// Apply one structural edit
    pub fn apply_change(&mut self, event: ChangeEvent) -> Result<()> {
        debug!(rundown = %self.id(), segment = %event.segment_id(), "apply change");
        match event {
            ChangeEvent::SegmentCreated { segment } => self.add_segment(segment),
            ChangeEvent::SegmentUpdated { segment } => self.update_segment(segment),
            ChangeEvent::SegmentDeleted { segment_id } => self.remove_segment(&segment_id),
            ChangeEvent::PartCreated { segment_id, part } => self.add_part(&segment_id, part),
            ChangeEvent::PartUpdated { segment_id, part } => self.update_part(&segment_id, part),
            ChangeEvent::PartDeleted { segment_id, part_id } => {
                self.remove_part_from_segment(&segment_id, &part_id)
            }
        }
    }
}

/// Serialized source content of a segment, ignoring runtime state and ad
/// hoc or unsynced parts
fn source_content(segment: &Segment) -> Option<serde_yaml::Value> {
    let mut source = segment.clone();
    source.set_rundown_id(String::new());
    source.remove_unplanned_parts();
    source.remove_unsynced_parts();
    serde_yaml::to_value(&source).ok()
}

/// Events turning the live segments into `incoming`
pub fn diff_segments(live: &[Segment], incoming: &[Segment]) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for segment in live.iter().filter(|s| !s.is_unsynced()) {
        if !incoming.iter().any(|s| s.id() == segment.id()) {
            events.push(ChangeEvent::SegmentDeleted {
                segment_id: segment.id().to_string(),
            });
        }
    }

    for segment in incoming {
        match live.iter().find(|s| s.id() == segment.id()) {
            None => events.push(ChangeEvent::SegmentCreated {
                segment: segment.clone(),
            }),
            Some(current) => {
                let changed = match (source_content(current), source_content(segment)) {
                    (Some(a), Some(b)) => a != b,
                    _ => true,
                };
                if changed {
                    events.push(ChangeEvent::SegmentUpdated {
                        segment: segment.clone(),
                    });
                }
            }
        }
    }

    events
}
