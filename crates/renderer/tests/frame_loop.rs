mod common;

use std::time::Duration;

use glam::Mat4;
use renderer::{
    Camera, Command, DrawCall, DriverState, FaultPolicy, FixedTimeSource, FrameDriver,
    FrameError, FrameSetup, GeometryBinder, GpuBackend, GpuResource, HeadlessBackend,
    IndexFormat, ManualScheduler, PipelineBuilder, PipelineOptions, RendererConfig,
    RotationPolicy, Scene, SceneDescription, SteppedTimeSource, SurfaceSize, TickOutcome,
};

fn config() -> RendererConfig {
    RendererConfig {
        validate: true,
        ..RendererConfig::default()
    }
}

fn surface() -> SurfaceSize {
    SurfaceSize::new(800, 600)
}

fn triangle_scene() -> SceneDescription {
    SceneDescription::new("triangle", common::color_shaders(), common::triangle())
}

#[test]
fn triangle_draws_three_vertices_from_offset_zero() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, triangle_scene(), &config()).unwrap();

    scene.start(&mut backend, &mut scheduler, surface()).unwrap();
    assert_eq!(scene.state(), DriverState::Running);
    assert!(scheduler.take_pending());

    backend.take_commands();
    assert_eq!(scene.tick(&mut backend, &mut scheduler), TickOutcome::Drawn);
    assert_eq!(backend.draw_calls(), vec![DrawCall::Arrays { first: 0, count: 3 }]);
    assert!(scheduler.is_pending());
    assert_eq!(backend.frames(), 1);

    let order: Vec<&str> = backend
        .commands()
        .iter()
        .map(|command| match command {
            Command::SetUniform { .. } => "uniform",
            Command::Clear(_) => "clear",
            Command::BindTexture { .. } => "texture",
            Command::Draw { .. } => "draw",
            Command::FinishFrame => "finish",
        })
        .collect();
    assert_eq!(order, ["uniform", "clear", "draw", "finish"]);
}

#[test]
fn normalized_float_attributes_draw_like_plain_ones() {
    let mut geometry = common::triangle();
    for binding in &mut geometry.attributes {
        binding.layout = binding.layout.clone().normalized();
    }
    let description = SceneDescription::new("normalized", common::color_shaders(), geometry);

    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, description, &config()).unwrap();
    assert_eq!(scene.geometry().vertex_count, 3);

    scene.start(&mut backend, &mut scheduler, surface()).unwrap();
    assert_eq!(scene.tick(&mut backend, &mut scheduler), TickOutcome::Drawn);
    assert_eq!(backend.draw_calls(), vec![DrawCall::Arrays { first: 0, count: 3 }]);
}

#[test]
fn indexed_cube_draws_all_indices_with_declared_type() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, common::cube_scene(), &config()).unwrap();
    assert_eq!(scene.geometry().vertex_count, 24);
    assert_eq!(scene.draw_count(), 36);

    scene.start(&mut backend, &mut scheduler, surface()).unwrap();
    scene.tick(&mut backend, &mut scheduler);

    let draws = backend.draw_calls();
    assert_eq!(draws.len(), 1);
    match draws[0] {
        DrawCall::Indexed {
            count,
            format,
            offset,
            ..
        } => {
            assert_eq!(count, 36);
            assert_eq!(format, IndexFormat::Uint16);
            assert_eq!(offset, 0);
        }
        other => panic!("expected an indexed draw, got {other:?}"),
    }
    assert!(backend
        .commands()
        .iter()
        .any(|command| matches!(command, Command::BindTexture { unit: 0, .. })));
}

#[test]
fn start_uploads_camera_matrices() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, triangle_scene(), &config()).unwrap();
    scene.start(&mut backend, &mut scheduler, surface()).unwrap();

    let camera = Camera::default();
    let program = scene.program().handle();
    assert_eq!(backend.uniform(program, "mView"), Some(camera.view()));
    assert_eq!(
        backend.uniform(program, "mProj"),
        Some(camera.projection(surface().aspect_ratio()))
    );
    assert_eq!(backend.uniform(program, "mWorld"), None);

    scene.resize(&mut backend, SurfaceSize::new(600, 600)).unwrap();
    assert_eq!(backend.uniform(program, "mProj"), Some(camera.projection(1.0)));
}

#[test]
fn stop_cancels_pending_tick() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, triangle_scene(), &config()).unwrap();
    scene.start(&mut backend, &mut scheduler, surface()).unwrap();
    scene.tick(&mut backend, &mut scheduler);
    let draws_before = backend.draw_calls().len();
    let requests_before = scheduler.requests();

    scene.stop();
    assert_eq!(scene.state(), DriverState::Idle);
    assert_eq!(scene.tick(&mut backend, &mut scheduler), TickOutcome::Stopped);
    assert_eq!(backend.draw_calls().len(), draws_before);
    assert_eq!(scheduler.requests(), requests_before);
}

#[test]
fn cancelled_token_stops_before_next_draw() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, triangle_scene(), &config()).unwrap();
    let token = scene.start(&mut backend, &mut scheduler, surface()).unwrap();

    token.cancel();
    assert_eq!(scene.tick(&mut backend, &mut scheduler), TickOutcome::Stopped);
    assert!(backend.draw_calls().is_empty());
    assert_eq!(scene.state(), DriverState::Idle);
}

#[test]
fn world_rotation_repeats_after_full_period() {
    let period = RotationPolicy::default().full_period().unwrap();
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, triangle_scene(), &config()).unwrap();
    scene.set_clock(SteppedTimeSource::new(Duration::from_secs_f64(period)));
    scene.start(&mut backend, &mut scheduler, surface()).unwrap();

    scene.tick(&mut backend, &mut scheduler);
    let first = scene.world();
    scene.tick(&mut backend, &mut scheduler);
    let second = scene.world();
    assert!(first.abs_diff_eq(second, 1e-4), "{first} vs {second}");
    assert!(first.abs_diff_eq(Mat4::IDENTITY, 1e-6));
}

#[test]
fn custom_transform_replaces_rotation_policy() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let transform = |seconds: f64| Mat4::from_translation(glam::Vec3::new(seconds as f32, 0.0, 0.0));
    let mut scene = Scene::setup_with_transform(
        &mut backend,
        triangle_scene(),
        &config(),
        Some(Box::new(transform)),
    )
    .unwrap();
    scene.set_clock(FixedTimeSource::new(2.5));
    scene.start(&mut backend, &mut scheduler, surface()).unwrap();
    scene.tick(&mut backend, &mut scheduler);

    let expected = Mat4::from_translation(glam::Vec3::new(2.5, 0.0, 0.0));
    assert_eq!(scene.world(), expected);
    assert_eq!(backend.uniform(scene.program().handle(), "mWorld"), Some(expected));
}

fn textured_setup(backend: &mut HeadlessBackend) -> FrameSetup {
    let program = PipelineBuilder::new(PipelineOptions { validate: true })
        .build(backend, &common::textured_shaders())
        .unwrap();
    let geometry = GeometryBinder::bind(backend, program.handle(), &common::cube()).unwrap();
    let textures = GeometryBinder::upload_textures(backend, &[common::checker_texture()]).unwrap();
    FrameSetup {
        program: program.handle(),
        geometry,
        textures,
        camera: Camera::default().matrices(1.0),
        draw_count: 36,
        indexed: true,
    }
}

#[test]
fn skip_frame_policy_keeps_loop_alive() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let setup = textured_setup(&mut backend);
    let texture = setup.textures[0];
    let mut driver = FrameDriver::new(RotationPolicy::default()).with_fault_policy(FaultPolicy::SkipFrame);
    driver.start(&mut backend, &mut scheduler, setup).unwrap();
    scheduler.take_pending();

    backend.release(GpuResource::Texture(texture));
    assert_eq!(driver.tick(&mut backend, &mut scheduler), TickOutcome::Skipped);
    assert_eq!(driver.state(), DriverState::Running);
    assert!(scheduler.take_pending());
    assert!(backend.draw_calls().is_empty());
}

#[test]
fn stop_policy_returns_to_idle() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let setup = textured_setup(&mut backend);
    let texture = setup.textures[0];
    let mut driver = FrameDriver::new(RotationPolicy::default()).with_fault_policy(FaultPolicy::Stop);
    let token = driver.start(&mut backend, &mut scheduler, setup).unwrap();
    scheduler.take_pending();

    backend.release(GpuResource::Texture(texture));
    assert_eq!(driver.tick(&mut backend, &mut scheduler), TickOutcome::Stopped);
    assert_eq!(driver.state(), DriverState::Idle);
    assert!(token.is_cancelled());
    assert!(!scheduler.is_pending());
}

#[test]
fn start_rejects_unsatisfiable_draws() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();

    let mut setup = textured_setup(&mut backend);
    setup.draw_count = 37;
    let mut driver = FrameDriver::new(RotationPolicy::Static);
    let err = driver.start(&mut backend, &mut scheduler, setup.clone()).unwrap_err();
    assert!(matches!(
        err,
        FrameError::DrawCountOutOfRange {
            requested: 37,
            available: 36,
            ..
        }
    ));

    setup.geometry.indices = None;
    setup.draw_count = 36;
    let err = driver.start(&mut backend, &mut scheduler, setup).unwrap_err();
    assert!(matches!(err, FrameError::MissingIndexBuffer));
    assert_eq!(driver.state(), DriverState::Idle);
    assert_eq!(scheduler.requests(), 0);
}

#[test]
fn release_destroys_every_object() {
    let mut backend = HeadlessBackend::new();
    let mut scheduler = ManualScheduler::new();
    let mut scene = Scene::setup(&mut backend, common::cube_scene(), &config()).unwrap();
    scene.start(&mut backend, &mut scheduler, surface()).unwrap();
    scene.tick(&mut backend, &mut scheduler);
    assert!(backend.live_objects() > 0);

    scene.release(&mut backend);
    assert_eq!(backend.live_objects(), 0);
}
