// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timeline generation.
//!
//! The builder turns a rundown snapshot into groups of timeline objects:
//! - baseline: always-on studio objects
//! - active part group, anchored to the take time
//! - previous part group, overlapping into the active part
//! - lookahead: upcoming content pre-loaded per studio layer
//! - infinite groups: pieces that outlive their part
//!
//! Building is a pure function of the rundown and studio; the same inputs
//! always yield the same output, in the same order.

mod builder;
mod lookahead;
mod object;

pub use builder::build;
pub use object::{TimeValue, TimelineEnable, TimelineObject};

use serde::{Deserialize, Serialize};

/// Group holding baseline objects
pub const BASELINE_GROUP_ID: &str = "baseline_group";

/// Group holding lookahead objects
pub const LOOKAHEAD_GROUP_ID: &str = "lookahead_group";

/// Id of the group for the part on air
pub fn active_group_id(part_id: &str) -> String {
    format!("active_group_{}", part_id)
}

/// Id of the group for the part that was on air before
pub fn previous_group_id(part_id: &str) -> String {
    format!("previous_group_{}", part_id)
}

/// Id of the group for an infinite piece
pub fn infinite_group_id(active_part_id: &str, piece_id: &str) -> String {
    format!("infinite_group_{}_{}", active_part_id, piece_id)
}

/// Id of a piece's control object within a part group
pub fn piece_control_id(parent_id: &str, piece_id: &str) -> String {
    format!("{}_piece_control_{}", parent_id, piece_id)
}

/// Id of a piece's child group within a part group
pub fn piece_group_id(parent_id: &str, piece_id: &str) -> String {
    format!("{}_piece_group_{}", parent_id, piece_id)
}

/// Id of the pre-roll object for a control object
pub fn pre_roll_id(control_id: &str) -> String {
    format!("pre_roll_{}", control_id)
}

/// When the playout device should take the next part by itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoNextTrigger {
    pub epoch_time_to_take_next: u64,
}

/// A generated timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub groups: Vec<TimelineObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_next: Option<AutoNextTrigger>,
}

impl Timeline {
    /// Get a top-level group by id
    pub fn group(&self, id: &str) -> Option<&TimelineObject> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Find any object by id
    pub fn find(&self, id: &str) -> Option<&TimelineObject> {
        self.groups.iter().find_map(|g| g.find(id))
    }

    /// Count every object, groups included
    pub fn object_count(&self) -> usize {
        fn count(object: &TimelineObject) -> usize {
            1 + object.children.iter().map(count).sum::<usize>()
        }
        self.groups.iter().map(count).sum()
    }
}
