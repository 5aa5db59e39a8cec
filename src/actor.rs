use glam::{Vec2, Vec3};
use std::fmt;
use std::sync::Arc;

use crate::animation::{AnimationDescriptor, AnimationDriver, DriverState, RepeatMode};
use crate::assets::skeletal::SkeletalClip;
use crate::assets::{ModelProvider, SceneAsset};
use crate::callbacks::{CallbackHandle, CallbackRef, CallbackRegistry};
use crate::camera3d::Camera3D;
use crate::config::ActorConfig;
use crate::direction::Direction;
use crate::error::{ActorError, ActorResult};
use crate::instance::LiveModelInstance;
use crate::lighting::LightingRig;
use crate::math::{vec2_angle_degrees, EulerDegrees};
use crate::pose::PoseDeriver;
use crate::renderer::{OffscreenRenderer, RenderFlags, SurfaceFactory, SurfaceRequest, TextureRegion};

pub mod state;

pub use state::{ActorState, Vec3Data, DEFAULT_CAMERA_FOV, DEFAULT_CAMERA_NAME};

const STAND_ANIMATION: &str = "stand";
const WALK_ANIMATION: &str = "walk";

/// Everything that only exists between `retrieve_assets` and `dispose`.
struct Resolved {
    asset: Arc<SceneAsset>,
    instance: LiveModelInstance,
    rig: LightingRig,
    camera: Camera3D,
    renderer: OffscreenRenderer,
}

/// A rigged 3D model rendered into its own texture and shown as a 2D sprite.
///
/// Lifecycle: configure, `load_assets`, let the provider finish loading,
/// `retrieve_assets`, then `update` once per frame until `dispose`.
pub struct Sprite3DActor {
    id: String,
    config: ActorConfig,
    model_id: Option<String>,
    width: u32,
    height: u32,
    camera_pos: Option<Vec3>,
    camera_rot: Option<EulerDegrees>,
    camera_name: String,
    camera_fov: f32,
    light_node_name: String,
    model_rotation: f32,
    position: Vec2,
    init_animation: Option<String>,
    driver: AnimationDriver,
    resolved: Option<Resolved>,
    model_requested: bool,
    render_requested: bool,
}

impl Sprite3DActor {
    pub fn new(id: impl Into<String>, config: ActorConfig) -> Self {
        let camera_name = config.camera.node_name.clone();
        let camera_fov = config.camera.fov_degrees;
        let light_node_name = config.lighting.point.node_name.clone();
        Self {
            id: id.into(),
            config,
            model_id: None,
            width: 200,
            height: 200,
            camera_pos: None,
            camera_rot: None,
            camera_name,
            camera_fov,
            light_node_name,
            model_rotation: 0.0,
            position: Vec2::ZERO,
            init_animation: None,
            driver: AnimationDriver::new(),
            resolved: None,
            model_requested: false,
            render_requested: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    pub fn set_model(&mut self, model_id: impl Into<String>) {
        self.model_id = Some(model_id.into());
    }

    pub fn sprite_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Takes effect at the next `retrieve_assets`.
    pub fn set_sprite_size(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn camera_position(&self) -> Option<Vec3> {
        self.camera_pos
    }

    pub fn set_camera_position(&mut self, position: Option<Vec3>) {
        self.camera_pos = position;
    }

    pub fn camera_rotation(&self) -> Option<EulerDegrees> {
        self.camera_rot
    }

    pub fn set_camera_rotation(&mut self, rotation: Option<EulerDegrees>) {
        self.camera_rot = rotation;
    }

    pub fn camera_name(&self) -> &str {
        &self.camera_name
    }

    pub fn set_camera_name(&mut self, name: impl Into<String>) {
        self.camera_name = name.into();
    }

    pub fn camera_fov(&self) -> f32 {
        self.camera_fov
    }

    pub fn set_camera_fov(&mut self, fov_degrees: f32) {
        self.camera_fov = fov_degrees;
    }

    pub fn light_node_name(&self) -> &str {
        &self.light_node_name
    }

    pub fn set_light_node_name(&mut self, name: impl Into<String>) {
        self.light_node_name = name.into();
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn model_rotation(&self) -> f32 {
        self.model_rotation
    }

    pub fn initial_animation(&self) -> Option<&str> {
        self.init_animation.as_deref()
    }

    /// Clip started (looping) as soon as assets are resolved.
    pub fn set_initial_animation(&mut self, clip_id: Option<String>) {
        self.init_animation = clip_id;
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn animation_state(&self) -> DriverState {
        self.driver.state()
    }

    pub fn driver(&self) -> &AnimationDriver {
        &self.driver
    }

    pub fn instance(&self) -> Option<&LiveModelInstance> {
        self.resolved.as_ref().map(|resolved| &resolved.instance)
    }

    pub fn lighting(&self) -> Option<&LightingRig> {
        self.resolved.as_ref().map(|resolved| &resolved.rig)
    }

    pub fn camera(&self) -> Option<&Camera3D> {
        self.resolved.as_ref().map(|resolved| &resolved.camera)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.resolved.as_ref().map(|resolved| resolved.renderer.frames_rendered()).unwrap_or(0)
    }

    pub fn render_flags(&self) -> RenderFlags {
        match self.resolved.as_ref() {
            Some(resolved) => resolved.renderer.flags(),
            None => self.config.debug.render_flags(),
        }
    }

    pub fn set_render_flags(&mut self, flags: RenderFlags) {
        if let Some(resolved) = self.resolved.as_mut() {
            resolved.renderer.set_flags(flags);
            self.render_requested = true;
        }
    }

    /// Texture region the host draws as this actor's sprite.
    pub fn sprite_region(&self) -> Option<TextureRegion> {
        self.resolved.as_ref().and_then(|resolved| resolved.renderer.texture_region())
    }

    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.resolved.as_ref().and_then(|resolved| resolved.renderer.color_view())
    }

    /// First phase of asset loading: asks the provider for the model.
    pub fn load_assets(&mut self, provider: &mut dyn ModelProvider) {
        let Some(model_id) = self.model_id.as_deref() else {
            log::warn!("actor '{}' has no model to load", self.id);
            return;
        };
        if self.model_requested {
            return;
        }
        provider.load_model(model_id);
        self.model_requested = true;
    }

    /// Second phase: instantiates the model, derives camera and lights and
    /// builds the offscreen surface.
    pub fn retrieve_assets(
        &mut self,
        provider: &dyn ModelProvider,
        surfaces: &mut dyn SurfaceFactory,
    ) -> ActorResult<()> {
        let model_id =
            self.model_id.clone().ok_or_else(|| ActorError::missing_model(format!("<unset on {}>", self.id)))?;
        let asset = provider.get_model(&model_id).ok_or_else(|| ActorError::missing_model(model_id.clone()))?;

        if let Some(mut previous) = self.resolved.take() {
            previous.renderer.release();
        }

        let instance = LiveModelInstance::new(Arc::clone(&asset));
        let rig = LightingRig::build(&self.config.lighting, &instance, &self.light_node_name);
        let pose = PoseDeriver::new(&instance).camera(
            &self.config.camera,
            &self.camera_name,
            self.camera_pos,
            self.camera_rot,
            self.camera_fov,
        );

        let request = SurfaceRequest { asset: asset.as_ref(), width: self.width, height: self.height, config: &self.config };
        let backend = surfaces.create_backend(request).map_err(ActorError::from_setup)?;
        let renderer = OffscreenRenderer::new(backend, self.width, self.height, &self.config);
        self.camera_pos = Some(pose.position);
        self.camera_rot = Some(pose.rotation);

        log::debug!(
            "actor '{}' resolved '{model_id}': camera at {} rot ({}, {}, {}), light at {}",
            self.id,
            pose.position,
            pose.rotation.pitch,
            pose.rotation.yaw,
            pose.rotation.roll,
            rig.point_light.position
        );
        self.resolved = Some(Resolved { asset, instance, rig, camera: pose.camera(), renderer });

        if let Some(init) = self.init_animation.clone() {
            // Failures are logged inside and leave the model in its rest pose.
            let _ = self.start_frame_animation(&init, RepeatMode::Repeat, -1, false, None);
        }
        self.lookat_angle(self.model_rotation);
        self.render_now();
        Ok(())
    }

    /// Releases the surface and the model reference. Safe to call twice.
    pub fn dispose(&mut self, provider: &mut dyn ModelProvider) {
        if let Some(mut resolved) = self.resolved.take() {
            resolved.renderer.release();
        }
        if self.model_requested {
            if let Some(model_id) = self.model_id.as_deref() {
                provider.dispose_model(model_id);
            }
            self.model_requested = false;
        }
        self.render_requested = false;
    }

    /// Per-frame step: dispatch last frame's completion, advance the clip,
    /// re-render. Never fails; render errors are logged.
    pub fn update(&mut self, dt: f32, registry: &dyn CallbackRegistry) {
        self.dispatch_pending(registry);

        let advanced = self.driver.advance(dt).is_some();
        if advanced {
            if let (Some(resolved), Some(clip)) = (self.resolved.as_mut(), self.driver.current_clip()) {
                resolved.instance.apply_clip(clip, self.driver.time());
            }
        }
        if advanced || self.render_requested {
            self.render_now();
        }
    }

    fn dispatch_pending(&mut self, registry: &dyn CallbackRegistry) {
        let Some(callback) = self.driver.take_pending() else {
            return;
        };
        let key = callback.key().map(str::to_owned);
        match callback.resolve(registry) {
            Some(handle) => handle.on_event(),
            None => log::error!(
                "actor '{}': completion callback '{}' is not registered",
                self.id,
                key.as_deref().unwrap_or("?")
            ),
        }
    }

    /// Renders the surface now. Without resolved assets the request is kept
    /// for the first frame after `retrieve_assets`.
    pub fn render_now(&mut self) {
        let Some(resolved) = self.resolved.as_mut() else {
            self.render_requested = true;
            return;
        };
        self.render_requested = false;
        if let Err(err) = resolved.renderer.render(&resolved.camera, &resolved.instance, &resolved.rig) {
            log::warn!("actor '{}' render failed: {err:#}", self.id);
        }
    }

    /// Plays `id`, or `base` of a `base.direction` id after turning to face
    /// `direction`. When nothing matches, `callback` runs immediately.
    pub fn start_frame_animation(
        &mut self,
        id: &str,
        repeat: RepeatMode,
        count: i32,
        reverse: bool,
        callback: Option<CallbackHandle>,
    ) -> ActorResult<()> {
        let clip = match self.find_clip(id) {
            Some(clip) => Some((clip, id.to_string())),
            None => match id.split_once('.') {
                Some((base, direction)) => {
                    let _ = self.lookat_direction(direction);
                    self.find_clip(base).map(|clip| (clip, base.to_string()))
                }
                None => None,
            },
        };

        let Some((clip, clip_id)) = clip else {
            let available = self.animations();
            log::error!("animation '{id}' not found in actor '{}'", self.id);
            for clip_id in &available {
                log::debug!("  available animation: {clip_id}");
            }
            if let Some(callback) = callback {
                callback.on_event();
            }
            return Err(ActorError::ClipNotFound { id: id.to_string(), available });
        };

        let descriptor = AnimationDescriptor::new(clip_id)
            .repeat(repeat)
            .count(count)
            .reversed(reverse)
            .on_complete(callback.map(CallbackRef::from));
        self.driver.play(clip, descriptor);
        if let (Some(resolved), Some(clip)) = (self.resolved.as_mut(), self.driver.current_clip()) {
            resolved.instance.apply_clip(clip, self.driver.time());
        }
        Ok(())
    }

    fn find_clip(&self, id: &str) -> Option<Arc<SkeletalClip>> {
        self.resolved.as_ref().and_then(|resolved| resolved.asset.clip(id).cloned())
    }

    /// Plays the standing clip once.
    pub fn stand(&mut self) -> ActorResult<()> {
        self.start_frame_animation(STAND_ANIMATION, RepeatMode::NoRepeat, 1, false, None)
    }

    /// Faces `to` and loops the walk clip.
    pub fn start_walk(&mut self, from: Vec2, to: Vec2) -> ActorResult<()> {
        self.lookat_between(from, to);
        self.start_frame_animation(WALK_ANIMATION, RepeatMode::Repeat, -1, false, None)
    }

    pub fn current_frame_animation_id(&self) -> ActorResult<&str> {
        self.driver.current_clip_id().ok_or(ActorError::NotFound("current animation"))
    }

    /// Clip ids of the resolved model, in file order.
    pub fn animations(&self) -> Vec<String> {
        self.resolved.as_ref().map(|resolved| resolved.asset.clip_ids()).unwrap_or_default()
    }

    pub fn lookat_direction(&mut self, direction: &str) -> ActorResult<()> {
        match direction.parse::<Direction>() {
            Ok(direction) => {
                self.lookat_angle(direction.angle_degrees());
                Ok(())
            }
            Err(err) => {
                log::error!("actor '{}': {err}", self.id);
                Err(err)
            }
        }
    }

    /// Faces the 2D point `target` as seen from the actor's position.
    pub fn lookat_point(&mut self, target: Vec2) {
        self.lookat_between(self.position, target);
    }

    fn lookat_between(&mut self, from: Vec2, to: Vec2) {
        self.lookat_angle(vec2_angle_degrees(to - from) + 90.0);
    }

    /// Sets the model's yaw about +Y in degrees.
    pub fn lookat_angle(&mut self, degrees: f32) {
        self.model_rotation = degrees;
        if let Some(resolved) = self.resolved.as_mut() {
            resolved.instance.set_root_yaw(degrees);
            self.render_requested = true;
        }
    }

    /// Snapshot for saving; a live callback is registered to get its key.
    pub fn to_state(&self, registry: &dyn CallbackRegistry) -> ActorState {
        ActorState {
            model3d: self.model_id.clone(),
            width: self.width,
            height: self.height,
            camera_pos: self.camera_pos.map(Vec3Data::from),
            camera_rot: self.camera_rot.map(Vec3Data::from),
            camera_name: self.camera_name.clone(),
            camera_fov: self.camera_fov,
            model_rotation: self.model_rotation,
            call_cb: self.driver.has_pending_callback(),
            animation_cb: self.driver.callback().map(|callback| callback.persist_key(registry)),
        }
    }

    /// Rebuilds an unresolved actor from a save. The callback stays a key
    /// until its first dispatch.
    pub fn from_state(id: impl Into<String>, config: ActorConfig, state: ActorState) -> Self {
        let mut actor = Self::new(id, config);
        actor.model_id = state.model3d;
        actor.set_sprite_size(state.width, state.height);
        actor.camera_pos = state.camera_pos.map(Vec3::from);
        actor.camera_rot = state.camera_rot.map(EulerDegrees::from);
        actor.camera_name = state.camera_name;
        actor.camera_fov = state.camera_fov;
        actor.model_rotation = state.model_rotation;
        actor.driver.restore_callback(state.animation_cb.map(CallbackRef::Key), state.call_cb);
        actor
    }
}

impl fmt::Display for Sprite3DActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sprite3DActor '{}' ({})", self.id, self.model_id.as_deref().unwrap_or("no model"))?;
        write!(f, "  Animations: {}", self.animations().join(", "))?;
        if let Some(current) = self.driver.current_clip_id() {
            write!(f, "\n  Current Animation: {current} [{}]", self.driver.state())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sprite3DActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite3DActor")
            .field("id", &self.id)
            .field("model_id", &self.model_id)
            .field("size", &(self.width, self.height))
            .field("model_rotation", &self.model_rotation)
            .field("state", &self.driver.state())
            .field("resolved", &self.resolved.is_some())
            .finish()
    }
}
