// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error taxonomy for the rundown core.
//!
//! Every failure is an explicit variant. Mode preconditions, missing
//! entities, on-air conflicts and history misses are surfaced to callers.
//! The three boundary signals (`LastPartInSegment`, `LastSegmentInRundown`,
//! `LastPartInRundown`) drive traversal inside the component that raised
//! them and never escape a public rundown operation.

use thiserror::Error;

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, RundownError>;

/// Errors raised by the rundown state machine, timeline builder and ports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RundownError {
    /// Operation requires an activated rundown
    #[error("rundown {0} is not activated")]
    NotActivated(String),

    /// Rundown is already active
    #[error("rundown {0} is already activated")]
    AlreadyActivated(String),

    /// Rundown is already in rehearsal
    #[error("rundown {0} is already in rehearsal")]
    AlreadyRehearsal(String),

    /// Referenced entity does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Part is on air and cannot be set as next
    #[error("part {0} is on air")]
    OnAir(String),

    /// No part after the given one in its segment
    #[error("part {0} is the last part in its segment")]
    LastPartInSegment(String),

    /// No playable segment after the given one
    #[error("segment {0} is the last segment in the rundown")]
    LastSegmentInRundown(String),

    /// No playable part after the given one
    #[error("part {0} is the last part in the rundown")]
    LastPartInRundown(String),

    /// History search found nothing
    #[error("no part in history matches")]
    NoPartInHistory,

    /// Missing or invalid configuration
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// Invariant violation; a defect, not recoverable
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Persistence transport failure, not retried
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The owning service task has stopped
    #[error("rundown service stopped")]
    ServiceStopped,
}

impl RundownError {
    /// Shorthand for a missing entity
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        RundownError::NotFound { kind, id: id.into() }
    }

    /// Check if this is a traversal boundary signal
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            RundownError::LastPartInSegment(_)
                | RundownError::LastSegmentInRundown(_)
                | RundownError::LastPartInRundown(_)
        )
    }

    /// Check if this error marks a defect rather than a caller mistake
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RundownError::UnsupportedOperation(_) | RundownError::Persistence(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = RundownError::not_found("segment", "seg1");
        assert_eq!(err.to_string(), "segment seg1 not found");
    }

    #[test]
    fn test_boundary_classification() {
        assert!(RundownError::LastPartInSegment("p".into()).is_boundary());
        assert!(RundownError::LastSegmentInRundown("s".into()).is_boundary());
        assert!(RundownError::LastPartInRundown("p".into()).is_boundary());
        assert!(!RundownError::NoPartInHistory.is_boundary());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(RundownError::UnsupportedOperation("x".into()).is_fatal());
        assert!(RundownError::Persistence("io".into()).is_fatal());
        assert!(!RundownError::OnAir("p".into()).is_fatal());
    }
}
