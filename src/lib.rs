// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! onair - live rundown automation core.
//!
//! A rundown is an ordered list of segments, each holding parts, each
//! holding pieces. The [`rundown`] module tracks what is on air and what
//! is next as operators take through the show; the [`timeline`] module
//! turns that state into timeline groups a playout device can execute.

pub mod config;
pub mod error;
pub mod rundown;
pub mod service;
pub mod store;
pub mod studio;
pub mod timeline;

pub use error::{Result, RundownError};
pub use rundown::{ChangeEvent, Part, Piece, Rundown, RundownMode, Segment};
pub use service::{RundownHandle, RundownService};
pub use store::RundownStore;
pub use studio::Studio;
pub use timeline::{build, Timeline};
