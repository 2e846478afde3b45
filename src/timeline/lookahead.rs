// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Lookahead: pre-loading upcoming content per studio layer.

use super::object::{TimeValue, TimelineEnable, TimelineObject};
use super::{active_group_id, LOOKAHEAD_GROUP_ID};
use crate::rundown::{Part, PieceLifespan, PieceTransition, Rundown};
use crate::studio::{LookaheadMode, Studio, StudioLayer};

const LOOKAHEAD_PRIORITY: f64 = 0.1;

/// Suffix for objects taken from the part already on air
const FOR_ACTIVE_SUFFIX: &str = "_forActive";

/// Build the lookahead group for every layer with lookahead enabled
pub(super) fn lookahead_group(
    rundown: &Rundown,
    studio: &Studio,
    active: Option<&Part>,
) -> TimelineObject {
    let mut group = TimelineObject::group(LOOKAHEAD_GROUP_ID)
        .with_enable(TimelineEnable::always())
        .with_priority(LOOKAHEAD_PRIORITY);
    for layer in studio.lookahead_layers() {
        group.children.extend(layer_objects(rundown, layer, active));
    }
    group
}

fn layer_objects(rundown: &Rundown, layer: &StudioLayer, active: Option<&Part>) -> Vec<TimelineObject> {
    let mut objects = Vec::new();

    // Content already on air, up to the moment the active group started
    if let Some(part) = active {
        let end = TimeValue::start_of(&active_group_id(part.id()));
        for piece in part
            .pieces()
            .iter()
            .filter(|p| p.layer() == layer.id && p.lifespan() == PieceLifespan::WithinPart)
        {
            for object in piece.timeline_objects() {
                let mut found = lookahead_object(object, layer, FOR_ACTIVE_SUFFIX);
                found.enable = TimelineEnable::starting(TimeValue::Number(0)).with_end(end.clone());
                objects.push(found);
            }
        }
    }

    let mut cursor = match active {
        Some(part) => rundown.find_part_after(part.id()).ok(),
        None => rundown.next_part().or_else(|| rundown.first_playable_part()),
    };
    let mut found = 0;
    let mut hops = 0;
    while let Some(part) = cursor {
        if hops >= layer.maximum_lookahead_search_distance
            || found >= layer.amount_of_lookahead_objects_to_find
        {
            break;
        }
        let candidates = part
            .pieces()
            .iter()
            .filter(|p| p.layer() == layer.id && p.transition() == PieceTransition::NoTransition)
            .flat_map(|p| p.timeline_objects());
        for object in candidates {
            if found >= layer.amount_of_lookahead_objects_to_find {
                break;
            }
            let mut upcoming = lookahead_object(object, layer, "");
            upcoming.enable = TimelineEnable::always();
            objects.push(upcoming);
            found += 1;
        }
        hops += 1;
        // LastPartInRundown ends the walk
        cursor = rundown.find_part_after(part.id()).ok();
    }

    objects
}

fn lookahead_object(object: &TimelineObject, layer: &StudioLayer, suffix: &str) -> TimelineObject {
    let mut clone = object
        .rekeyed(format!("{}_{}{}", LOOKAHEAD_GROUP_ID, object.id, suffix))
        .in_group(LOOKAHEAD_GROUP_ID);
    clone.is_lookahead = true;
    if layer.lookahead_mode == LookaheadMode::Preload {
        clone.lookahead_for_layer = Some(object.layer.clone());
        clone.layer = format!("{}_lookahead", object.layer);
    }
    clone
}
