pub mod actor;
pub mod animation;
pub mod assets;
pub mod callbacks;
pub mod camera3d;
pub mod config;
pub mod direction;
pub mod error;
pub mod instance;
pub mod lighting;
pub mod math;
pub mod mesh;
pub mod pose;
pub mod renderer;

pub use actor::{ActorState, Sprite3DActor};
pub use animation::{AnimationDescriptor, AnimationDriver, DriverState, PlayDirection, RepeatMode};
pub use assets::{ModelCache, ModelProvider, NodeLookup, NodeTransform, SceneAsset};
pub use callbacks::{callback, ActionCallback, CallbackArena, CallbackHandle, CallbackRef, CallbackRegistry};
pub use config::ActorConfig;
pub use direction::Direction;
pub use error::{ActorError, ActorResult, AssetKind};
pub use math::EulerDegrees;
pub use renderer::{
    GpuContext, OffscreenRenderer, RenderFlags, RenderViewport, SurfaceBackend, SurfaceFactory, TextureRegion,
    WgpuSurfaceFactory,
};
