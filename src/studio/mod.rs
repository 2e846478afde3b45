// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Studio configuration: the playout layers and their lookahead policy.

use serde::{Deserialize, Serialize};

/// How a layer pre-loads upcoming content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookaheadMode {
    /// No lookahead
    #[default]
    None,
    /// Upcoming objects go to a shadow `<layer>_lookahead` layer
    Preload,
    /// Upcoming objects play on the real layer whenever it is clear
    WhenClear,
}

fn default_amount() -> usize {
    1
}

fn default_distance() -> usize {
    10
}

/// A playout layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioLayer {
    pub id: String,
    #[serde(default)]
    pub lookahead_mode: LookaheadMode,
    /// Objects to collect ahead of the active part
    #[serde(default = "default_amount")]
    pub amount_of_lookahead_objects_to_find: usize,
    /// Parts to search ahead of the active part
    #[serde(default = "default_distance")]
    pub maximum_lookahead_search_distance: usize,
}

impl StudioLayer {
    /// Create a layer with default search limits
    pub fn new(id: impl Into<String>, lookahead_mode: LookaheadMode) -> Self {
        Self {
            id: id.into(),
            lookahead_mode,
            amount_of_lookahead_objects_to_find: default_amount(),
            maximum_lookahead_search_distance: default_distance(),
        }
    }

    /// Builder: set how many objects to find
    pub fn with_amount(mut self, amount: usize) -> Self {
        self.amount_of_lookahead_objects_to_find = amount;
        self
    }

    /// Builder: set how many parts to search
    pub fn with_search_distance(mut self, distance: usize) -> Self {
        self.maximum_lookahead_search_distance = distance;
        self
    }

    /// Check if lookahead is enabled
    pub fn has_lookahead(&self) -> bool {
        self.lookahead_mode != LookaheadMode::None
    }
}

/// A studio and its layer mappings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Studio {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub layers: Vec<StudioLayer>,
}

impl Studio {
    /// Create a studio without layers
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            layers: Vec::new(),
        }
    }

    /// Builder: add layer
    pub fn with_layer(mut self, layer: StudioLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Get layer by id
    pub fn layer(&self, id: &str) -> Option<&StudioLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layers with lookahead enabled
    pub fn lookahead_layers(&self) -> impl Iterator<Item = &StudioLayer> {
        self.layers.iter().filter(|l| l.has_lookahead())
    }
}
