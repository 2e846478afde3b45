// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Compiles a rundown snapshot into timeline groups.

use tracing::trace;

use super::lookahead::lookahead_group;
use super::object::{TimeValue, TimelineEnable, TimelineObject};
use super::{
    active_group_id, infinite_group_id, piece_control_id, piece_group_id, pre_roll_id,
    previous_group_id, AutoNextTrigger, Timeline, BASELINE_GROUP_ID,
};
use crate::error::{Result, RundownError};
use crate::rundown::{Part, PartTimings, Piece, PieceLifespan, PieceTransition, Rundown};
use crate::studio::Studio;

const BASELINE_PRIORITY: f64 = 0.0;
const ACTIVE_PRIORITY: f64 = 5.0;
const PREVIOUS_PRIORITY: f64 = -1.0;
const INFINITE_PRIORITY: f64 = 1.0;

/// Build the timeline for the current state of `rundown`.
///
/// Fails with `Misconfiguration` without a studio, and with
/// `UnsupportedOperation` when a previous part or an infinite piece was
/// never stamped with an execution time.
pub fn build(rundown: &Rundown, studio: Option<&Studio>) -> Result<Timeline> {
    let studio = studio.ok_or_else(|| {
        RundownError::Misconfiguration(format!("no studio for rundown {}", rundown.id()))
    })?;

    let mut groups = vec![baseline_group(rundown)];

    let Some(active_part) = rundown.active_part() else {
        groups.push(lookahead_group(rundown, studio, None));
        return Ok(Timeline {
            groups,
            auto_next: None,
        });
    };

    let active = active_group(active_part);
    let auto_next = auto_next_trigger(rundown, active_part, &active);
    let active_id = active.id.clone();
    groups.push(active);

    if let Some(previous) = rundown.previous_part() {
        groups.push(previous_group(previous, active_part, &active_id)?);
    }

    groups.push(lookahead_group(rundown, studio, Some(active_part)));
    groups.extend(infinite_groups(rundown, active_part)?);

    trace!(rundown = %rundown.id(), groups = groups.len(), "timeline built");
    Ok(Timeline { groups, auto_next })
}

fn baseline_group(rundown: &Rundown) -> TimelineObject {
    let mut group = TimelineObject::group(BASELINE_GROUP_ID)
        .with_enable(TimelineEnable::always())
        .with_priority(BASELINE_PRIORITY);
    group.children = rundown
        .baseline_objects()
        .iter()
        .map(|o| o.clone().in_group(BASELINE_GROUP_ID))
        .collect();
    group
}

fn active_group(part: &Part) -> TimelineObject {
    let id = active_group_id(part.id());
    let timings = part.timings();

    let mut enable = TimelineEnable::starting(TimeValue::epoch(part.executed_at()));
    if part.auto_next().is_some() {
        if let Some(expected) = part.expected_duration().filter(|d| *d > 0) {
            enable.duration = Some(TimeValue::from(
                expected + timings.delay_start_of_pieces_duration,
            ));
        }
    }

    let mut group = TimelineObject::group(&id)
        .with_enable(enable)
        .with_priority(ACTIVE_PRIORITY);
    group.children = part
        .pieces()
        .iter()
        .flat_map(|piece| piece_objects(&id, piece, timings))
        .collect();
    group
}

fn previous_group(previous: &Part, active: &Part, active_id: &str) -> Result<TimelineObject> {
    if previous.executed_at() == 0 {
        return Err(RundownError::UnsupportedOperation(format!(
            "previous part {} was never executed",
            previous.id()
        )));
    }

    let id = previous_group_id(previous.id());
    let continue_into = active.timings().previous_part_continue_into_part_duration;
    let enable = TimelineEnable::starting(TimeValue::epoch(previous.executed_at()))
        .with_end(TimeValue::start_of(active_id).offset(continue_into as i64));

    let mut group = TimelineObject::group(&id)
        .with_enable(enable)
        .with_priority(PREVIOUS_PRIORITY);
    group.children = previous
        .pieces()
        .iter()
        .filter(|p| p.lifespan() == PieceLifespan::WithinPart)
        .flat_map(|piece| piece_objects(&id, piece, previous.timings()))
        .collect();
    Ok(group)
}

fn infinite_groups(rundown: &Rundown, active: &Part) -> Result<Vec<TimelineObject>> {
    let mut groups = Vec::new();
    for piece in rundown.infinite_pieces().values() {
        if piece.transition() != PieceTransition::NoTransition || piece.part_id() == active.id() {
            continue;
        }
        if piece.executed_at() == 0 {
            return Err(RundownError::UnsupportedOperation(format!(
                "infinite piece {} was never executed",
                piece.id()
            )));
        }

        let id = infinite_group_id(active.id(), piece.id());
        let mut enable = TimelineEnable::starting(TimeValue::epoch(piece.executed_at()));
        if let Some(duration) = piece.duration() {
            enable.duration = Some(TimeValue::from(duration));
        }

        let mut group = TimelineObject::group(&id)
            .with_enable(enable)
            .with_priority(INFINITE_PRIORITY);
        group.children = nested_objects(&id, piece);
        groups.push(group);
    }
    Ok(groups)
}

fn auto_next_trigger(rundown: &Rundown, active: &Part, group: &TimelineObject) -> Option<AutoNextTrigger> {
    let duration = group.enable.duration.as_ref()?.as_number()?;
    if duration <= 0 {
        return None;
    }
    let next = rundown.next_part().filter(|p| p.id() != active.id())?;
    let continue_into = next.timings().previous_part_continue_into_part_duration;
    Some(AutoNextTrigger {
        epoch_time_to_take_next: (active.executed_at() + duration as u64).saturating_sub(continue_into),
    })
}

/// Control object, optional pre-roll object, and child group for one piece
fn piece_objects(parent_id: &str, piece: &Piece, timings: &PartTimings) -> Vec<TimelineObject> {
    let Some(mut enable) = control_enable(parent_id, piece, timings) else {
        return Vec::new();
    };

    let control_id = piece_control_id(parent_id, piece.id());
    let mut objects = Vec::with_capacity(3);

    let pre_roll = piece.pre_roll_duration();
    if pre_roll > 0 && enable.start.as_ref().is_some_and(TimeValue::is_zero) {
        let pre_roll_id = pre_roll_id(&control_id);
        objects.push(
            TimelineObject::new(&pre_roll_id, piece.layer())
                .in_group(parent_id)
                .with_enable(
                    TimelineEnable::starting(TimeValue::start_of(parent_id))
                        .with_duration(TimeValue::from(pre_roll)),
                ),
        );
        enable.start = Some(TimeValue::start_of(&pre_roll_id).offset(pre_roll as i64));
    }

    objects.push(
        TimelineObject::new(&control_id, piece.layer())
            .in_group(parent_id)
            .with_enable(enable),
    );

    let group_id = piece_group_id(parent_id, piece.id());
    let group_enable = TimelineEnable::starting(
        TimeValue::start_of(&control_id).offset(-(pre_roll as i64)),
    )
    .with_end(TimeValue::end_of(&control_id).offset(piece.post_roll_duration() as i64));
    let mut group = TimelineObject::group(&group_id)
        .in_group(parent_id)
        .with_enable(group_enable);
    group.children = nested_objects(&group_id, piece);
    objects.push(group);

    objects
}

fn control_enable(parent_id: &str, piece: &Piece, timings: &PartTimings) -> Option<TimelineEnable> {
    match piece.transition() {
        PieceTransition::InTransition => {
            let start = timings.in_transition_start?;
            let mut enable = TimelineEnable::starting(TimeValue::from(start + piece.start()));
            if let Some(duration) = piece.duration() {
                enable.duration = Some(TimeValue::from(duration));
            }
            Some(enable)
        }
        PieceTransition::OutTransition => {
            let keep_alive = timings.keep_alive_duration?;
            let start = TimeValue::end_of(parent_id)
                .offset(-(keep_alive as i64))
                .offset(-(timings.post_roll_duration as i64));
            Some(TimelineEnable::starting(start))
        }
        PieceTransition::NoTransition => {
            let delay = if piece.is_planned() {
                timings.delay_start_of_pieces_duration
            } else {
                0
            };
            let mut enable = TimelineEnable::starting(TimeValue::from(piece.start() + delay));
            match piece.duration() {
                Some(duration) => enable.duration = Some(TimeValue::from(duration)),
                None if timings.post_roll_duration > 0 => {
                    enable.end = Some(
                        TimeValue::end_of(parent_id).offset(-(timings.post_roll_duration as i64)),
                    )
                }
                None => {}
            }
            Some(enable)
        }
    }
}

/// Clone a piece's nested objects into `group_id`
fn nested_objects(group_id: &str, piece: &Piece) -> Vec<TimelineObject> {
    piece
        .timeline_objects()
        .iter()
        .map(|o| {
            o.rekeyed(format!("{}_{}_{}", group_id, piece.id(), o.id))
                .in_group(group_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rundown::Segment;
    use crate::studio::{LookaheadMode, StudioLayer};

    fn studio() -> Studio {
        Studio::new("studio").with_layer(StudioLayer::new("camera", LookaheadMode::Preload))
    }

    fn cam(id: &str) -> Piece {
        Piece::new(id, "camera").with_object(TimelineObject::new(format!("{}_obj", id), "camera"))
    }

    fn rundown() -> Rundown {
        Rundown::new("r", "")
            .with_baseline_object(TimelineObject::new("bg", "background"))
            .with_segment(
                Segment::new("s", 1.0)
                    .with_part(Part::new("p1", 1.0).with_piece(cam("c1")))
                    .with_part(Part::new("p2", 2.0).with_piece(cam("c2")))
                    .with_part(Part::new("p3", 3.0).with_piece(cam("c3"))),
            )
    }

    #[test]
    fn test_missing_studio() {
        assert!(matches!(
            build(&rundown(), None),
            Err(RundownError::Misconfiguration(_))
        ));
    }

    #[test]
    fn test_inactive_has_baseline_and_lookahead() {
        let timeline = build(&rundown(), Some(&studio())).unwrap();
        let ids: Vec<_> = timeline.groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["baseline_group", "lookahead_group"]);
        let baseline = timeline.group("baseline_group").unwrap();
        assert_eq!(baseline.enable.while_, Some(TimeValue::always()));
        assert_eq!(baseline.children[0].in_group.as_deref(), Some("baseline_group"));
        assert!(timeline.auto_next.is_none());
    }

    #[test]
    fn test_group_order_and_priorities() {
        let mut r = rundown();
        r.activate().unwrap();
        r.take_next_at(1_000).unwrap();
        r.take_next_at(2_000).unwrap();

        let timeline = build(&r, Some(&studio())).unwrap();
        let ids: Vec<_> = timeline.groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["baseline_group", "active_group_p2", "previous_group_p1", "lookahead_group"]
        );
        assert_eq!(timeline.groups[1].priority, 5.0);
        assert_eq!(timeline.groups[2].priority, -1.0);
        assert_eq!(timeline.groups[3].priority, 0.1);
        assert_eq!(timeline.groups[1].enable.start, Some(TimeValue::Number(2_000)));
    }

    #[test]
    fn test_piece_objects_ids() {
        let mut r = rundown();
        r.activate().unwrap();
        r.take_next_at(1_000).unwrap();
        let timeline = build(&r, Some(&studio())).unwrap();

        let control = timeline.find("active_group_p1_piece_control_c1").unwrap();
        assert_eq!(control.enable.start, Some(TimeValue::Number(0)));
        assert_eq!(control.in_group.as_deref(), Some("active_group_p1"));

        let group = timeline.find("active_group_p1_piece_group_c1").unwrap();
        assert_eq!(
            group.enable.start.as_ref().map(ToString::to_string).as_deref(),
            Some("#active_group_p1_piece_control_c1.start")
        );
        assert_eq!(
            group.enable.end.as_ref().map(ToString::to_string).as_deref(),
            Some("#active_group_p1_piece_control_c1.end")
        );
        let nested = &group.children[0];
        assert_eq!(nested.id, "active_group_p1_piece_group_c1_c1_c1_obj");
        assert_eq!(nested.in_group.as_deref(), Some("active_group_p1_piece_group_c1"));
    }

    #[test]
    fn test_previous_group_end() {
        let mut r = Rundown::new("r", "").with_segment(
            Segment::new("s", 1.0)
                .with_part(Part::new("a", 1.0).with_piece(Piece::new("x", "L").with_post_roll(40)))
                .with_part(Part::new("b", 2.0)),
        );
        r.activate().unwrap();
        r.take_next_at(10).unwrap();
        r.take_next_at(20).unwrap();
        let timeline = build(&r, Some(&studio())).unwrap();
        let previous = timeline.group("previous_group_a").unwrap();
        assert_eq!(previous.enable.start, Some(TimeValue::Number(10)));
        assert_eq!(
            previous.enable.end.as_ref().map(ToString::to_string).as_deref(),
            Some("#active_group_b.start + 40")
        );
    }

    #[test]
    fn test_transition_pieces() {
        let mut r = Rundown::new("r", "").with_segment(
            Segment::new("s", 1.0)
                .with_part(Part::new("a", 1.0).with_out_transition(0))
                .with_part(
                    Part::new("b", 2.0)
                        .with_in_transition(200, 100)
                        .with_out_transition(300)
                        .with_piece(
                            Piece::new("wipe", "dve")
                                .with_transition(PieceTransition::InTransition)
                                .with_duration(500),
                        )
                        .with_piece(
                            Piece::new("sting", "dve")
                                .with_transition(PieceTransition::OutTransition),
                        )
                        .with_piece(Piece::new("cam", "camera")),
                ),
        );
        r.activate().unwrap();
        r.take_next_at(1).unwrap();
        r.take_next_at(2).unwrap();
        let timeline = build(&r, Some(&studio())).unwrap();

        let wipe = timeline.find("active_group_b_piece_control_wipe").unwrap();
        assert_eq!(wipe.enable.start, Some(TimeValue::Number(0)));
        assert_eq!(wipe.enable.duration, Some(TimeValue::Number(500)));

        let sting = timeline.find("active_group_b_piece_control_sting").unwrap();
        assert_eq!(
            sting.enable.start.as_ref().map(ToString::to_string).as_deref(),
            Some("#active_group_b.end - 300")
        );

        let cam = timeline.find("active_group_b_piece_control_cam").unwrap();
        assert_eq!(cam.enable.start, Some(TimeValue::Number(100)));
    }

    #[test]
    fn test_in_transition_skipped_on_first_take() {
        let mut r = Rundown::new("r", "").with_segment(
            Segment::new("s", 1.0).with_part(
                Part::new("a", 1.0).with_in_transition(200, 100).with_piece(
                    Piece::new("wipe", "dve").with_transition(PieceTransition::InTransition),
                ),
            ),
        );
        r.activate().unwrap();
        r.take_next_at(1).unwrap();
        let timeline = build(&r, Some(&studio())).unwrap();
        assert!(timeline.find("active_group_a_piece_control_wipe").is_none());
        assert!(timeline.find("active_group_a_piece_group_wipe").is_none());
    }

    #[test]
    fn test_post_roll_ends_relative_to_group() {
        let mut r = Rundown::new("r", "").with_segment(
            Segment::new("s", 1.0).with_part(
                Part::new("a", 1.0)
                    .with_piece(Piece::new("vt", "video").with_post_roll(80))
                    .with_piece(Piece::new("cam", "camera")),
            ),
        );
        r.activate().unwrap();
        r.take_next_at(1).unwrap();
        let timeline = build(&r, Some(&studio())).unwrap();

        let cam = timeline.find("active_group_a_piece_control_cam").unwrap();
        assert_eq!(
            cam.enable.end.as_ref().map(ToString::to_string).as_deref(),
            Some("#active_group_a.end - 80")
        );
        let vt_group = timeline.find("active_group_a_piece_group_vt").unwrap();
        assert_eq!(
            vt_group.enable.end.as_ref().map(ToString::to_string).as_deref(),
            Some("#active_group_a_piece_control_vt.end + 80")
        );
    }

    #[test]
    fn test_previous_part_without_execution_is_fatal() {
        let mut r = rundown();
        r.activate().unwrap();
        r.take_next_at(1_000).unwrap();
        r.take_next_at(0).unwrap();
        r.take_next_at(3_000).unwrap();
        assert!(matches!(
            build(&r, Some(&studio())),
            Err(RundownError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_infinite_group() {
        let mut r = Rundown::new("r", "").with_segment(
            Segment::new("s", 1.0)
                .with_part(
                    Part::new("a", 1.0).with_piece(
                        Piece::new("bed", "audio")
                            .with_lifespan(PieceLifespan::SpanningUntilRundownEnd)
                            .with_duration(9_000)
                            .with_object(TimelineObject::new("music", "audio")),
                    ),
                )
                .with_part(Part::new("b", 2.0)),
        );
        r.activate().unwrap();
        r.take_next_at(500).unwrap();
        let timeline = build(&r, Some(&studio())).unwrap();
        // still in its own part: no infinite group
        assert!(timeline.group("infinite_group_a_bed").is_none());

        r.take_next_at(900).unwrap();
        let timeline = build(&r, Some(&studio())).unwrap();
        let group = timeline.group("infinite_group_b_bed").unwrap();
        assert_eq!(group.priority, 1.0);
        assert_eq!(group.enable.start, Some(TimeValue::Number(500)));
        assert_eq!(group.enable.duration, Some(TimeValue::Number(9_000)));
        assert_eq!(group.children[0].id, "infinite_group_b_bed_bed_music");
    }
}
