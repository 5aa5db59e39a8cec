#![allow(dead_code)]

use anyhow::Result;
use glam::{Mat4, Quat, Vec2, Vec3};
use sprite3d_actor::assets::skeletal::{SkeletalClip, SkeletonAsset, SkeletonJoint};
use sprite3d_actor::assets::ModelCache;
use sprite3d_actor::instance::LiveModelInstance;
use sprite3d_actor::lighting::LightEnvironment;
use sprite3d_actor::mesh::{Mesh, MeshVertex};
use sprite3d_actor::renderer::{FrameView, SurfaceRequest};
use sprite3d_actor::{
    callback, ActorConfig, ActorError, CallbackArena, CallbackHandle, RenderViewport, SceneAsset, Sprite3DActor,
    SurfaceBackend, SurfaceFactory, TextureRegion,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MODEL_ID: &str = "actor_rig";
pub const HOST_VIEWPORT: RenderViewport = RenderViewport { origin: (0.0, 0.0), size: (1280.0, 720.0) };

/// Three root nodes (Body, Camera, Light) and the walk/die/stand clips.
pub fn fixture_asset() -> SceneAsset {
    let skeleton = SkeletonAsset::new(vec![
        SkeletonJoint::new("Body", None),
        SkeletonJoint::new("Camera", None).with_rest(
            Vec3::new(0.0, 1.5, 4.0),
            Quat::from_rotation_x(-15f32.to_radians()),
            Vec3::ONE,
        ),
        SkeletonJoint::new("Light", None).with_rest(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::ONE),
    ])
    .expect("fixture hierarchy is valid");
    let triangle = Mesh::new(
        vec![
            MeshVertex::new(Vec3::new(-0.5, 0.0, 0.0), Vec3::Z, Vec2::ZERO),
            MeshVertex::new(Vec3::new(0.5, 0.0, 0.0), Vec3::Z, Vec2::X),
            MeshVertex::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, Vec2::Y),
        ],
        vec![0, 1, 2],
    )
    .with_name("body");
    SceneAsset::new(MODEL_ID, skeleton)
        .with_mesh(triangle, 0)
        .with_clip(SkeletalClip::translation_sweep("walk", 0, Vec3::ZERO, Vec3::Z, 1.0))
        .with_clip(SkeletalClip::translation_sweep("die", 0, Vec3::ZERO, Vec3::new(0.0, -1.0, 0.0), 0.5))
        .with_clip(SkeletalClip::translation_sweep("stand", 0, Vec3::ZERO, Vec3::new(0.0, 0.1, 0.0), 0.8))
}

pub fn fixture_cache() -> ModelCache {
    let mut cache = ModelCache::new("fixtures/gltf");
    cache.insert_model(fixture_asset());
    cache
}

/// Callback that counts how often it ran.
pub fn counting_callback() -> (Arc<AtomicUsize>, CallbackHandle) {
    let counter = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&counter);
    let handle = callback(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    });
    (counter, handle)
}

pub fn hits(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Shadow,
    Begin([f32; 4]),
    Floor { point_lights: usize, receives_shadow: bool },
    Axes,
    Model { point_lights: usize, ambient: Vec3 },
    End(RenderViewport),
    Release,
}

#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<Step>>>);

impl Recorder {
    pub fn push(&self, step: Step) {
        self.0.borrow_mut().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&Step) -> bool) -> usize {
        self.0.borrow().iter().filter(|step| pred(step)).count()
    }
}

/// Backend that records the pass sequence instead of touching a GPU.
pub struct RecordingBackend {
    recorder: Recorder,
    viewport: RenderViewport,
    width: u32,
    height: u32,
    fail_model: bool,
}

impl SurfaceBackend for RecordingBackend {
    fn viewport(&self) -> RenderViewport {
        self.viewport
    }

    fn render_shadow_map(&mut self, _light_view_proj: Mat4, _instance: &LiveModelInstance) -> Result<()> {
        self.recorder.push(Step::Shadow);
        Ok(())
    }

    fn begin_surface(&mut self, clear_color: [f32; 4]) -> Result<()> {
        self.viewport = RenderViewport::from_size(self.width, self.height);
        self.recorder.push(Step::Begin(clear_color));
        Ok(())
    }

    fn draw_floor(&mut self, _frame: &FrameView, environment: &LightEnvironment) -> Result<()> {
        self.recorder.push(Step::Floor {
            point_lights: environment.point_lights.len(),
            receives_shadow: environment.receives_shadow,
        });
        Ok(())
    }

    fn draw_axes(&mut self, _frame: &FrameView, _environment: &LightEnvironment) -> Result<()> {
        self.recorder.push(Step::Axes);
        Ok(())
    }

    fn draw_model(
        &mut self,
        _frame: &FrameView,
        environment: &LightEnvironment,
        _instance: &LiveModelInstance,
    ) -> Result<()> {
        if self.fail_model {
            anyhow::bail!("device lost");
        }
        self.recorder.push(Step::Model { point_lights: environment.point_lights.len(), ambient: environment.ambient });
        Ok(())
    }

    fn end_surface(&mut self, restore: RenderViewport) -> Result<()> {
        self.viewport = restore;
        self.recorder.push(Step::End(restore));
        Ok(())
    }

    fn texture_region(&self) -> TextureRegion {
        TextureRegion::full(self.width, self.height).flipped_y()
    }

    fn release(&mut self) {
        self.recorder.push(Step::Release);
    }
}

#[derive(Default)]
pub struct RecordingFactory {
    pub recorder: Recorder,
    pub fail_model: bool,
    pub missing_shader: Option<String>,
    pub created: usize,
}

impl SurfaceFactory for RecordingFactory {
    fn create_backend(&mut self, request: SurfaceRequest<'_>) -> Result<Box<dyn SurfaceBackend>> {
        if let Some(shader) = self.missing_shader.as_ref() {
            return Err(anyhow::Error::new(ActorError::missing_shader(shader.clone()))
                .context(format!("building surface for '{}'", request.asset.id)));
        }
        self.created += 1;
        Ok(Box::new(RecordingBackend {
            recorder: self.recorder.clone(),
            viewport: HOST_VIEWPORT,
            width: request.width,
            height: request.height,
            fail_model: self.fail_model,
        }))
    }
}

pub struct Harness {
    pub actor: Sprite3DActor,
    pub cache: ModelCache,
    pub factory: RecordingFactory,
    pub callbacks: CallbackArena,
}

impl Harness {
    pub fn new(config: ActorConfig) -> Self {
        let mut actor = Sprite3DActor::new("ghost", config);
        actor.set_model(MODEL_ID);
        actor.set_sprite_size(320, 240);
        Self { actor, cache: fixture_cache(), factory: RecordingFactory::default(), callbacks: CallbackArena::new() }
    }

    pub fn resolve(&mut self) -> Result<(), ActorError> {
        self.actor.load_assets(&mut self.cache);
        self.cache.finish_loading();
        self.actor.retrieve_assets(&self.cache, &mut self.factory)
    }

    pub fn resolved(config: ActorConfig) -> Self {
        let mut harness = Self::new(config);
        harness.resolve().expect("fixture actor resolves");
        harness
    }

    pub fn update(&mut self, dt: f32) {
        self.actor.update(dt, &self.callbacks);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.factory.recorder.steps()
    }
}
