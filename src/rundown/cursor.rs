// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Active/next cursors.
//!
//! A cursor names a segment and a part within it, plus who set it. It is
//! an immutable value; transitions replace the whole cursor.

use serde::{Deserialize, Serialize};

/// Who last set a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Owner {
    /// Set by automatic advancement
    System,
    /// Set explicitly by an operator or external caller
    External,
}

/// Reference to a part within a segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RundownCursor {
    segment_id: String,
    part_id: String,
    owner: Owner,
}

impl RundownCursor {
    /// Create a new cursor
    pub fn new(segment_id: impl Into<String>, part_id: impl Into<String>, owner: Owner) -> Self {
        Self {
            segment_id: segment_id.into(),
            part_id: part_id.into(),
            owner,
        }
    }

    /// Get segment id
    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    /// Get part id
    pub fn part_id(&self) -> &str {
        &self.part_id
    }

    /// Get owner
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Check if set externally
    pub fn is_external(&self) -> bool {
        self.owner == Owner::External
    }

    /// Check if this cursor points at the given part
    pub fn points_at(&self, segment_id: &str, part_id: &str) -> bool {
        self.segment_id == segment_id && self.part_id == part_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor() {
        let cursor = RundownCursor::new("s1", "p1", Owner::External);
        assert_eq!(cursor.segment_id(), "s1");
        assert_eq!(cursor.part_id(), "p1");
        assert!(cursor.is_external());
        assert!(cursor.points_at("s1", "p1"));
        assert!(!cursor.points_at("s1", "p2"));
    }
}
