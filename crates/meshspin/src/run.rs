use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use assets::ScenePack;
use renderer::{
    DrawCall, HeadlessBackend, ManualScheduler, RendererConfig, Scene, SceneDescription,
    SteppedTimeSource, SurfaceSize, TickOutcome,
};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let scene_path = args
        .scene
        .as_deref()
        .ok_or_else(|| anyhow!("no scene given; pass SCENE or set MESHSPIN_SCENE"))?;
    let mut pack = load_pack(scene_path)?;
    if let Some(period) = args.period {
        let manifest = pack.manifest_mut();
        manifest.rotation = manifest.rotation.with_period(period);
    }

    let description = resolve_scene(&pack)?;
    let config = RendererConfig {
        surface_size: args.size.unwrap_or(RendererConfig::default().surface_size),
        title: format!("meshspin - {}", pack.name()),
        antialiasing: args.antialias,
        validate: args.validate_programs(),
        fault_policy: args.on_fault,
    };
    tracing::info!(
        scene = %pack.name(),
        root = %pack.root().display(),
        headless = args.headless,
        validate = config.validate,
        "starting scene"
    );

    if args.headless {
        run_headless(description, &config, args.frames, args.fps)
    } else {
        renderer::run_window(description, config)
    }
}

pub fn load_pack(path: &Path) -> Result<ScenePack> {
    ScenePack::load(path).with_context(|| format!("failed to load scene at {}", path.display()))
}

/// Fetches every resource the pack names on a current-thread runtime.
pub fn resolve_scene(pack: &ScenePack) -> Result<SceneDescription> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start resource loader runtime")?;
    runtime
        .block_on(pack.resolve())
        .with_context(|| format!("failed to load resources for scene '{}'", pack.name()))
}

/// Pumps the frame loop with the recording backend until `frames` ticks ran.
pub fn run_headless(
    description: SceneDescription,
    config: &RendererConfig,
    frames: u32,
    fps: u32,
) -> Result<()> {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene =
        Scene::setup(&mut backend, description, config).context("failed to set up scene")?;
    scene.set_clock(SteppedTimeSource::per_second(fps));

    let (width, height) = config.surface_size;
    scene
        .start(&mut backend, &mut scheduler, SurfaceSize::new(width, height))
        .context("failed to start frame loop")?;

    let (mut drawn, mut skipped) = (0u32, 0u32);
    while drawn + skipped < frames && scheduler.take_pending() {
        match scene.tick(&mut backend, &mut scheduler) {
            TickOutcome::Drawn => drawn += 1,
            TickOutcome::Skipped => skipped += 1,
            TickOutcome::Stopped => break,
        }
    }
    scene.stop();

    let last_draw = backend.draw_calls().last().copied();
    println!(
        "{}: {drawn} frames drawn, {skipped} skipped; {}",
        scene.name(),
        last_draw.map(describe_draw).unwrap_or_else(|| "no draw issued".to_string())
    );
    if !scene.geometry().skipped.is_empty() {
        println!("skipped attributes: {}", scene.geometry().skipped.join(", "));
    }
    scene.release(&mut backend);

    if frames > 0 && drawn == 0 {
        bail!("no frame was drawn");
    }
    Ok(())
}

fn describe_draw(call: DrawCall) -> String {
    match call {
        DrawCall::Arrays { first, count } => format!("arrays {count} from {first}"),
        DrawCall::Indexed { count, format, .. } => format!("indexed {count} ({format:?})"),
    }
}
