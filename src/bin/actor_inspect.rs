use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use serde::Serialize;
use serde_json::to_writer_pretty;
use sprite3d_actor::assets::ModelCache;
use sprite3d_actor::lighting::LightingRig;
use sprite3d_actor::pose::PoseDeriver;
use sprite3d_actor::{
    ActorConfig, CallbackArena, GpuContext, SceneAsset, Sprite3DActor, WgpuSurfaceFactory,
};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

const SPRITE_SIZE: (u32, u32) = (200, 200);

fn print_help() {
    eprintln!(
        "Usage: actor_inspect --model <path> [options]\n\n\
         Options:\n  --model <path>    glTF/GLB model to inspect (required)\n  \
         --config <path>   Actor config JSON (defaults apply when omitted)\n  \
         --camera <node>   Camera node name (defaults to the config value)\n  \
         --light <node>    Light node name (defaults to the config value)\n  \
         --render          Render one frame on a headless GPU and report the sprite region\n  \
         --out <path>      Destination for the report JSON (defaults to stdout)\n  \
         --compact         Emit minified JSON instead of pretty output\n  \
         -h, --help        Show this message"
    );
}

#[derive(Debug, Serialize)]
struct ClipReport {
    id: String,
    duration: f32,
}

#[derive(Debug, Serialize)]
struct CameraReport {
    node: String,
    position: [f32; 3],
    rotation: [f32; 3],
    fov_degrees: f32,
    /// Pixel position of the model origin on a default-sized sprite.
    #[serde(skip_serializing_if = "Option::is_none")]
    origin_px: Option<[f32; 2]>,
}

#[derive(Debug, Serialize)]
struct MeshReport {
    name: Option<String>,
    joint: u32,
    skinned: bool,
    triangles: usize,
    center: [f32; 3],
    radius: f32,
}

#[derive(Debug, Serialize)]
struct LightReport {
    node: String,
    position: [f32; 3],
    shadow_direction: [f32; 3],
}

#[derive(Debug, Serialize)]
struct RenderReport {
    adapter_available: bool,
    frames_rendered: u64,
    region: Option<[f32; 4]>,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    model: String,
    nodes: Vec<String>,
    meshes: Vec<MeshReport>,
    clips: Vec<ClipReport>,
    camera: CameraReport,
    light: LightReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    render: Option<RenderReport>,
}

struct Options {
    model: PathBuf,
    config: ActorConfig,
    camera_node: String,
    light_node: String,
    render: bool,
}

fn inspect(options: &Options) -> Result<InspectReport> {
    let id = model_id(&options.model)?;
    let asset = SceneAsset::load_gltf(&id, &options.model)?;
    let deriver = PoseDeriver::new(&asset);
    let pose = deriver.camera(
        &options.config.camera,
        &options.camera_node,
        None,
        None,
        options.config.camera.fov_degrees,
    );
    let rig = LightingRig::build(&options.config.lighting, &asset, &options.light_node);

    let render = if options.render { Some(render_once(options, &id)?) } else { None };

    Ok(InspectReport {
        model: id,
        nodes: asset.node_names(),
        meshes: asset
            .meshes
            .iter()
            .map(|entry| MeshReport {
                name: entry.mesh.name.clone(),
                joint: entry.joint,
                skinned: entry.skinned,
                triangles: entry.mesh.indices.len() / 3,
                center: entry.mesh.bounds.center.to_array(),
                radius: entry.mesh.bounds.radius,
            })
            .collect(),
        clips: asset.clips.iter().map(|clip| ClipReport { id: clip.name.to_string(), duration: clip.duration }).collect(),
        camera: CameraReport {
            node: options.camera_node.clone(),
            position: pose.position.to_array(),
            rotation: pose.rotation.to_vec3().to_array(),
            fov_degrees: pose.fov_degrees,
            origin_px: pose.camera().project_point(Vec3::ZERO, SPRITE_SIZE).map(|px| px.to_array()),
        },
        light: LightReport {
            node: options.light_node.clone(),
            position: rig.point_light.position.to_array(),
            shadow_direction: rig.shadow_light.direction.to_array(),
        },
        render,
    })
}

fn render_once(options: &Options, id: &str) -> Result<RenderReport> {
    let context = match GpuContext::headless() {
        Ok(context) => context,
        Err(err) => {
            log::warn!("no GPU adapter available, skipping render: {err:#}");
            return Ok(RenderReport { adapter_available: false, frames_rendered: 0, region: None });
        }
    };
    let root = options.model.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut cache = ModelCache::new(root);
    let mut factory = WgpuSurfaceFactory::new(context);
    let callbacks = CallbackArena::new();

    let mut actor = Sprite3DActor::new("inspect", options.config.clone());
    actor.set_model(id);
    actor.set_sprite_size(SPRITE_SIZE.0, SPRITE_SIZE.1);
    actor.set_camera_name(options.camera_node.clone());
    actor.set_light_node_name(options.light_node.clone());
    actor.load_assets(&mut cache);
    cache.finish_loading();
    actor.retrieve_assets(&cache, &mut factory).with_context(|| format!("Resolving actor for '{id}'"))?;
    actor.update(0.0, &callbacks);

    let report = RenderReport {
        adapter_available: true,
        frames_rendered: actor.frames_rendered(),
        region: actor.sprite_region().map(|region| [region.u0, region.v0, region.u1, region.v1]),
    };
    actor.dispose(&mut cache);
    Ok(report)
}

fn model_id(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("Model path {} has no file name", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = std::env::args().skip(1);
    let mut model: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut camera_node: Option<String> = None;
    let mut light_node: Option<String> = None;
    let mut out_path: Option<PathBuf> = None;
    let mut render = false;
    let mut pretty = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model" => {
                let value = args.next().context("--model requires a path")?;
                model = Some(PathBuf::from(value));
            }
            "--config" => {
                let value = args.next().context("--config requires a path")?;
                config_path = Some(PathBuf::from(value));
            }
            "--camera" => {
                camera_node = Some(args.next().context("--camera requires a node name")?);
            }
            "--light" => {
                light_node = Some(args.next().context("--light requires a node name")?);
            }
            "--out" => {
                let value = args.next().context("--out requires a path")?;
                out_path = Some(PathBuf::from(value));
            }
            "--render" => {
                render = true;
            }
            "--compact" => {
                pretty = false;
            }
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(anyhow!("Unknown argument '{other}'. Use --help for usage."));
            }
        }
    }

    let model = model.ok_or_else(|| anyhow!("--model is required"))?;
    let config = match config_path {
        Some(path) => ActorConfig::load(&path)?,
        None => ActorConfig::default(),
    };
    let options = Options {
        camera_node: camera_node.unwrap_or_else(|| config.camera.node_name.clone()),
        light_node: light_node.unwrap_or_else(|| config.lighting.point.node_name.clone()),
        model,
        config,
        render,
    };
    let report = inspect(&options).with_context(|| format!("Inspecting {}", options.model.display()))?;

    match out_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Creating directory {}", parent.display()))?;
            }
            let file = File::create(&path).with_context(|| format!("Creating {}", path.display()))?;
            if pretty {
                to_writer_pretty(file, &report)?;
            } else {
                serde_json::to_writer(file, &report)?;
            }
            println!("Wrote report to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let handle = stdout.lock();
            if pretty {
                to_writer_pretty(handle, &report)?;
            } else {
                serde_json::to_writer(handle, &report)?;
            }
        }
    }

    Ok(())
}
