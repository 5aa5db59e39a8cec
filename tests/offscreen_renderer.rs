mod common;

use common::{Harness, Step, HOST_VIEWPORT, MODEL_ID};
use glam::Vec3;
use sprite3d_actor::{ActorConfig, ActorError, AssetKind, ModelProvider, RenderFlags, RepeatMode};

fn pass_sequence(steps: &[Step]) -> Vec<&'static str> {
    steps
        .iter()
        .map(|step| match step {
            Step::Shadow => "shadow",
            Step::Begin(_) => "begin",
            Step::Floor { .. } => "floor",
            Step::Axes => "axes",
            Step::Model { .. } => "model",
            Step::End(_) => "end",
            Step::Release => "release",
        })
        .collect()
}

#[test]
fn resolve_renders_one_frame_in_pass_order() {
    let h = Harness::resolved(ActorConfig::default());
    let steps = h.steps();
    assert_eq!(pass_sequence(&steps), ["shadow", "begin", "floor", "model", "end"]);
    assert_eq!(steps[1], Step::Begin([0.0; 4]));
    assert_eq!(steps[2], Step::Floor { point_lights: 0, receives_shadow: true });
    assert_eq!(steps[3], Step::Model { point_lights: 1, ambient: Vec3::ZERO });
    assert_eq!(steps[4], Step::End(HOST_VIEWPORT));
    assert_eq!(h.actor.frames_rendered(), 1);
}

#[test]
fn debug_axes_are_drawn_between_floor_and_model() {
    let mut config = ActorConfig::default();
    config.debug.draw_axes = true;
    let mut h = Harness::resolved(config);
    assert!(h.actor.render_flags().contains(RenderFlags::DRAW_AXES));
    assert_eq!(pass_sequence(&h.steps()), ["shadow", "begin", "floor", "axes", "model", "end"]);

    h.factory.recorder.clear();
    h.actor.set_render_flags(RenderFlags::empty());
    h.update(0.016);
    assert_eq!(pass_sequence(&h.steps()), ["shadow", "begin", "floor", "model", "end"]);
}

#[test]
fn idle_actor_does_not_rerender() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.factory.recorder.clear();
    h.update(0.016);
    h.update(0.016);
    assert!(h.steps().is_empty());

    h.actor.lookat_direction("right").expect("known direction");
    h.update(0.016);
    assert_eq!(h.factory.recorder.count(|step| *step == Step::Shadow), 1);
}

#[test]
fn playing_animation_rerenders_every_update() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.start_frame_animation("walk", RepeatMode::Repeat, -1, false, None).expect("walk exists");
    h.factory.recorder.clear();
    for _ in 0..4 {
        h.update(0.1);
    }
    assert_eq!(h.factory.recorder.count(|step| matches!(step, Step::End(_))), 4);
    assert_eq!(h.actor.frames_rendered(), 5);
}

#[test]
fn animation_moves_the_live_instance() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.start_frame_animation("walk", RepeatMode::Repeat, -1, false, None).expect("walk exists");
    h.update(0.5);
    let body = h.actor.instance().expect("resolved").joint_world(0);
    assert!((body.w_axis.z - 0.5).abs() < 1e-4, "{body:?}");
}

#[test]
fn draw_failures_are_swallowed_and_viewport_restored() {
    let mut h = Harness::new(ActorConfig::default());
    h.factory.fail_model = true;
    h.resolve().expect("render failures are not fatal");
    let steps = h.steps();
    assert_eq!(pass_sequence(&steps), ["shadow", "begin", "floor", "end"]);
    assert_eq!(steps.last(), Some(&Step::End(HOST_VIEWPORT)));
    assert_eq!(h.actor.frames_rendered(), 0);

    h.actor.start_frame_animation("walk", RepeatMode::Repeat, -1, false, None).expect("walk exists");
    h.update(0.1);
    assert_eq!(h.factory.recorder.count(|step| matches!(step, Step::End(_))), 2);
}

#[test]
fn sprite_region_is_flipped_and_sized() {
    let h = Harness::resolved(ActorConfig::default());
    let region = h.actor.sprite_region().expect("surface exists");
    assert!(region.is_flipped_y());
    assert_eq!((region.width, region.height), (320, 240));
}

#[test]
fn dispose_releases_once_and_returns_the_model() {
    let mut h = Harness::resolved(ActorConfig::default());
    assert_eq!(h.cache.ref_count(MODEL_ID), 1);
    h.actor.dispose(&mut h.cache);
    h.actor.dispose(&mut h.cache);
    assert_eq!(h.factory.recorder.count(|step| *step == Step::Release), 1);
    assert_eq!(h.cache.ref_count(MODEL_ID), 0);
    assert!(h.cache.get_model(MODEL_ID).is_none());
    assert!(!h.actor.is_resolved());
    assert!(h.actor.sprite_region().is_none());
}

#[test]
fn re_resolving_replaces_the_surface() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.retrieve_assets(&h.cache, &mut h.factory).expect("second resolve");
    assert_eq!(h.factory.created, 2);
    assert_eq!(h.factory.recorder.count(|step| *step == Step::Release), 1);
}

#[test]
fn missing_shader_aborts_resolve() {
    let mut h = Harness::new(ActorConfig::default());
    h.factory.missing_shader = Some("cel.wgsl".into());
    let err = h.resolve().expect_err("missing shader is fatal");
    assert!(err.is_fatal());
    assert!(matches!(err, ActorError::AssetMissing { kind: AssetKind::Shader, ref id } if id == "cel.wgsl"));
    assert!(!h.actor.is_resolved());
}

#[test]
fn failed_setup_keeps_camera_pose_derivable() {
    let mut h = Harness::new(ActorConfig::default());
    h.actor.set_camera_name("CameraThatIsNotThere");
    h.factory.missing_shader = Some("depth.wgsl".into());
    h.resolve().expect_err("missing shader is fatal");
    assert_eq!(h.actor.camera_position(), None);
    assert_eq!(h.actor.camera_rotation(), None);

    h.factory.missing_shader = None;
    h.actor.set_camera_name("Camera");
    h.resolve().expect("second resolve succeeds");
    assert_eq!(h.actor.camera_position(), Some(Vec3::new(0.0, 1.5, 4.0)));
}

#[test]
fn non_finite_steps_do_not_break_a_looping_actor() {
    let mut h = Harness::resolved(ActorConfig::default());
    h.actor.start_frame_animation("walk", RepeatMode::Repeat, -1, false, None).expect("walk exists");
    h.update(f32::INFINITY);
    h.update(f32::NAN);
    h.update(0.016);
    assert_eq!(h.actor.animation_state(), sprite3d_actor::DriverState::Playing);
    let body = h.actor.instance().expect("resolved").joint_world(0);
    assert!(body.w_axis.z.is_finite() && (body.w_axis.z - 0.016).abs() < 1e-4, "{body:?}");
}

#[test]
fn missing_model_aborts_resolve() {
    let mut h = Harness::new(ActorConfig::default());
    h.actor.set_model("not_a_model");
    let err = h.resolve().expect_err("missing model is fatal");
    assert!(matches!(err, ActorError::AssetMissing { kind: AssetKind::Model, ref id } if id == "not_a_model"));
    assert_eq!(h.factory.created, 0);
}
