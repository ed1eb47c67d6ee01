use std::fs;

use anyhow::{bail, Context, Result};
use renderer::{
    GpuBackend, GpuResource, HeadlessBackend, ManualScheduler, RendererConfig, Scene, ShaderStage,
    SurfaceSize,
};

use crate::cli::CheckArgs;
use crate::run::{load_pack, resolve_scene};

pub fn check(args: CheckArgs) -> Result<()> {
    match args.stage {
        Some(stage) => check_stage(&args, stage),
        None => check_scene(&args),
    }
}

fn check_stage(args: &CheckArgs, stage: ShaderStage) -> Result<()> {
    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let mut backend = HeadlessBackend::new();
    match backend.compile_shader(stage, &source) {
        Ok(handle) => {
            backend.release(GpuResource::Shader(handle));
            println!("{}: {stage} shader compiles", args.file.display());
            Ok(())
        }
        Err(log) => bail!(
            "failed to compile {stage} shader {}:\n{log}",
            args.file.display()
        ),
    }
}

/// Builds, validates, and binds the whole scene without touching a GPU.
fn check_scene(args: &CheckArgs) -> Result<()> {
    let pack = load_pack(&args.file)?;
    let description = resolve_scene(&pack)?;

    let mut backend = HeadlessBackend::new();
    let config = RendererConfig {
        validate: true,
        ..RendererConfig::default()
    };
    let mut scene = Scene::setup(&mut backend, description, &config)
        .with_context(|| format!("scene '{}' failed to set up", pack.name()))?;
    let (width, height) = config.surface_size;
    scene
        .start(&mut backend, &mut ManualScheduler::new(), SurfaceSize::new(width, height))
        .with_context(|| format!("scene '{}' cannot be drawn", pack.name()))?;
    println!(
        "{}: program links and validates; {} vertices, {} attributes bound, draw count {}",
        scene.name(),
        scene.geometry().vertex_count,
        scene.geometry().attributes.len(),
        scene.draw_count()
    );
    for name in &scene.geometry().skipped {
        println!("warning: attribute '{name}' is not used by the program");
    }
    scene.release(&mut backend);
    Ok(())
}
