mod common;

use common::{counting_callback, hits, Harness};
use sprite3d_actor::actor::ActorState;
use sprite3d_actor::{ActorConfig, ActorError, DriverState, RepeatMode, Sprite3DActor};

#[test]
fn valid_clip_starts_playing() {
    let mut h = Harness::resolved(ActorConfig::default());
    for id in ["walk", "die", "stand"] {
        h.actor.start_frame_animation(id, RepeatMode::Repeat, 1, false, None).expect("clip exists");
        assert_eq!(h.actor.animation_state(), DriverState::Playing);
        assert_eq!(h.actor.current_frame_animation_id().expect("clip assigned"), id);
    }
}

#[test]
fn no_animation_reports_not_found() {
    let h = Harness::resolved(ActorConfig::default());
    assert!(matches!(h.actor.current_frame_animation_id(), Err(ActorError::NotFound(_))));
    assert_eq!(h.actor.animation_state(), DriverState::Idle);
}

#[test]
fn dotted_id_turns_then_plays_base_clip() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.start_frame_animation("walk.left", RepeatMode::Repeat, -1, false, None).expect("base clip exists");
    assert_eq!(h.actor.current_frame_animation_id().expect("walk assigned"), "walk");
    assert_eq!(h.actor.model_rotation(), 270.0);
    assert_eq!(h.actor.instance().expect("resolved").root_yaw(), 270.0);
}

#[test]
fn unresolvable_id_fires_callback_immediately() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.start_frame_animation("walk", RepeatMode::Repeat, -1, false, None).expect("walk exists");

    let (counter, cb) = counting_callback();
    let err = h
        .actor
        .start_frame_animation("jump", RepeatMode::NoRepeat, 1, false, Some(cb))
        .expect_err("jump does not exist");
    assert_eq!(hits(&counter), 1);
    match err {
        ActorError::ClipNotFound { id, available } => {
            assert_eq!(id, "jump");
            assert_eq!(available, vec!["walk", "die", "stand"]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(h.actor.current_frame_animation_id().expect("walk still assigned"), "walk");
    assert!(!h.actor.driver().has_pending_callback());

    h.update(5.0);
    assert_eq!(hits(&counter), 1);
}

#[test]
fn unknown_direction_suffix_still_falls_back() {
    let mut h = Harness::resolved(ActorConfig::default());
    let (counter, cb) = counting_callback();
    assert!(h.actor.start_frame_animation("run.sideways", RepeatMode::Repeat, 1, false, Some(cb)).is_err());
    assert_eq!(hits(&counter), 1);
    assert_eq!(h.actor.model_rotation(), 0.0);
    assert_eq!(h.actor.animation_state(), DriverState::Idle);
}

#[test]
fn completion_dispatches_on_the_next_update_only() {
    let mut h = Harness::resolved(ActorConfig::default());
    let (counter, cb) = counting_callback();
    h.actor.start_frame_animation("die", RepeatMode::NoRepeat, 1, false, Some(cb)).expect("die exists");

    h.update(0.3);
    assert_eq!(hits(&counter), 0);
    h.update(0.3);
    assert_eq!(hits(&counter), 0);
    assert_eq!(h.actor.animation_state(), DriverState::FinishedPendingCallback);

    h.update(0.0);
    assert_eq!(hits(&counter), 1);
    assert_eq!(h.actor.animation_state(), DriverState::Holding);

    for _ in 0..10 {
        h.update(0.1);
    }
    assert_eq!(hits(&counter), 1);
    assert_eq!(h.actor.current_frame_animation_id().expect("clip held"), "die");
}

#[test]
fn infinite_walk_never_completes() {
    let mut h = Harness::resolved(ActorConfig::default());
    let (counter, cb) = counting_callback();
    h.actor.start_frame_animation("walk", RepeatMode::Repeat, -1, false, Some(cb)).expect("walk exists");
    for _ in 0..500 {
        h.update(0.05);
        assert_eq!(h.actor.animation_state(), DriverState::Playing);
    }
    assert_eq!(hits(&counter), 0);
}

#[test]
fn replacing_an_animation_drops_its_callback() {
    let mut h = Harness::resolved(ActorConfig::default());
    let (counter, cb) = counting_callback();
    h.actor.start_frame_animation("die", RepeatMode::NoRepeat, 1, false, Some(cb)).expect("die exists");
    h.update(1.0);
    assert!(h.actor.driver().has_pending_callback());

    h.actor.start_frame_animation("walk", RepeatMode::Repeat, -1, false, None).expect("walk exists");
    h.update(0.1);
    h.update(0.1);
    assert_eq!(hits(&counter), 0);
}

#[test]
fn reverse_playback_completes_at_clip_start() {
    let mut h = Harness::resolved(ActorConfig::default());
    let (counter, cb) = counting_callback();
    h.actor.start_frame_animation("die", RepeatMode::Reverse, 1, true, Some(cb)).expect("die exists");
    assert_eq!(h.actor.driver().time(), 0.5);
    h.update(0.6);
    assert_eq!(h.actor.driver().time(), 0.0);
    h.update(0.0);
    assert_eq!(hits(&counter), 1);
}

#[test]
fn stand_and_walk_helpers() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.stand().expect("stand exists");
    assert_eq!(h.actor.driver().remaining(), Some(1));
    assert_eq!(h.actor.driver().repeat_mode(), Some(RepeatMode::NoRepeat));

    h.actor.start_walk(glam::Vec2::ZERO, glam::Vec2::new(10.0, 0.0)).expect("walk exists");
    assert_eq!(h.actor.current_frame_animation_id().expect("walk assigned"), "walk");
    assert_eq!(h.actor.driver().remaining(), Some(-1));
    assert_eq!(h.actor.model_rotation(), 90.0);
}

#[test]
fn lookat_directions_and_points() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.lookat_direction("backleft").expect("known direction");
    assert_eq!(h.actor.model_rotation(), 225.0);

    assert!(matches!(h.actor.lookat_direction("up"), Err(ActorError::UnknownDirection(_))));
    assert_eq!(h.actor.model_rotation(), 225.0);

    h.actor.set_position(glam::Vec2::new(5.0, 5.0));
    h.actor.lookat_point(glam::Vec2::new(5.0, 10.0));
    assert!((h.actor.model_rotation() - 180.0).abs() < 1e-4);
}

#[test]
fn lookat_before_resolve_applies_at_resolve() {
    let mut h = Harness::new(ActorConfig::default());
    h.actor.lookat_angle(45.0);
    h.resolve().expect("fixture resolves");
    assert_eq!(h.actor.instance().expect("resolved").root_yaw(), 45.0);
}

#[test]
fn initial_animation_loops_after_resolve() {
    let mut h = Harness::new(ActorConfig::default());
    h.actor.set_initial_animation(Some("walk".into()));
    assert_eq!(h.actor.initial_animation(), Some("walk"));
    h.resolve().expect("fixture resolves");
    assert_eq!(h.actor.current_frame_animation_id().expect("walk assigned"), "walk");
    assert_eq!(h.actor.driver().remaining(), Some(-1));
    assert!(h.actor.driver().is_playing());
}

#[test]
fn unregistered_callback_key_is_dropped() {
    let state = ActorState::from_json(
        r#"{ "model3d": "actor_rig", "width": 64, "height": 64, "callCb": true, "animationCb": "nobody/home" }"#,
    )
    .expect("state parses");
    let mut actor = Sprite3DActor::from_state("ghost", ActorConfig::default(), state);
    assert!(actor.driver().has_pending_callback());
    actor.update(0.016, &sprite3d_actor::CallbackArena::new());
    assert!(!actor.driver().has_pending_callback());
    assert!(actor.driver().callback().is_none());
}
