//! Lumen headless driver
//!
//! Usage: `lumen [config.ron] [frames]`

use std::process::ExitCode;
use std::time::{Duration, Instant};

use glam::Vec3;
use lumen_core::{
    Attenuation, DirectionalLight, MeshComponent, PointLight, PrimitiveComponent, PrimitiveShape,
    Scene, SceneNode, Transform,
};
use lumen_renderer::{DeferredRenderer, Material, RenderContext, RenderResult, RendererConfig};

const DEFAULT_CONFIG: &str = "lumen.ron";
const DEFAULT_FRAMES: u32 = 60;

fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumen_cli=info,lumen_renderer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let frames = match args.next().map(|s| s.parse::<u32>()) {
        None => DEFAULT_FRAMES,
        Some(Ok(frames)) => frames,
        Some(Err(e)) => {
            tracing::error!("Invalid frame count: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config_path, frames) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str, frames: u32) -> RenderResult<()> {
    let config = RendererConfig::load_or_default(config_path);
    tracing::info!("Starting Lumen at {}x{}", config.width, config.height);

    let ctx = RenderContext::headless(config.width, config.height)?;
    let mut renderer = DeferredRenderer::new(ctx, config)?;
    let mut scene = build_scene(&mut renderer)?;
    let spinner = scene.find_by_name("spinner");

    let start = Instant::now();
    for frame in 0..frames {
        renderer.poll_hot_reload(Instant::now());

        if let Some(id) = spinner
            && let Some(node) = scene.get_mut(id)
        {
            node.transform.rotate_axis(Vec3::Y, 0.02);
        }

        let stats = renderer.render(&mut scene)?;
        if frame == 0 || frame + 1 == frames {
            tracing::info!("Frame {}: {}", frame, stats);
        }
    }

    let elapsed = start.elapsed();
    let per_frame = elapsed.checked_div(frames.max(1)).unwrap_or(Duration::ZERO);
    tracing::info!("Rendered {} frames in {:?} ({:?} per frame)", frames, elapsed, per_frame);
    Ok(())
}

fn bulb(color: Vec3) -> PointLight {
    let mut light = PointLight::new();
    light.set_color(color);
    light
}

/// Floor, a few shapes, a sun and two colored bulbs.
fn build_scene(renderer: &mut DeferredRenderer) -> RenderResult<Scene> {
    let plane = renderer.primitive_mesh(PrimitiveShape::Plane);
    let cube = renderer.primitive_mesh(PrimitiveShape::Cube);
    let sphere = renderer.primitive_mesh(PrimitiveShape::sphere());

    let materials = renderer.materials_mut();
    let floor = materials.insert(Material::new(Vec3::splat(0.6)).with_roughness(0.9));
    let copper = materials.insert(
        Material::new(Vec3::new(0.95, 0.64, 0.54))
            .with_metallic(1.0)
            .with_roughness(0.3),
    );
    let plastic = materials.insert(Material::new(Vec3::new(0.1, 0.3, 0.8)).with_roughness(0.5));

    let mut scene = Scene::new();
    let root = scene.root();
    let nodes = [
        SceneNode::new("floor")
            .with_transform(Transform::new().with_scale(Vec3::new(20.0, 1.0, 20.0)))
            .with_component(MeshComponent::new(plane).with_material(floor).with_casts_shadow(false)),
        SceneNode::new("spinner")
            .with_transform(Transform::from_position(Vec3::new(0.0, 0.5, 0.0)))
            .with_component(PrimitiveComponent::new(
                PrimitiveShape::Cube,
                MeshComponent::new(cube).with_material(copper),
            )),
        SceneNode::new("ball")
            .with_transform(Transform::from_position(Vec3::new(2.0, 0.5, -1.0)))
            .with_component(PrimitiveComponent::new(
                PrimitiveShape::sphere(),
                MeshComponent::new(sphere).with_material(plastic),
            )),
        SceneNode::new("sun").with_component(DirectionalLight::new(Vec3::new(-0.4, -1.0, -0.3))),
        SceneNode::new("warm bulb")
            .with_transform(Transform::from_position(Vec3::new(-2.0, 2.0, 1.0)))
            .with_component(bulb(Vec3::new(1.0, 0.7, 0.4))),
        SceneNode::new("cool bulb")
            .with_transform(Transform::from_position(Vec3::new(2.0, 1.5, 2.0)))
            .with_component(bulb(Vec3::new(0.4, 0.6, 1.0)).with_attenuation(Attenuation::new(1.0, 0.14, 0.07))),
    ];
    for node in nodes {
        scene.insert(root, node)?;
    }
    Ok(scene)
}
