use glam::Mat4;

use crate::backend::{GpuBackend, GpuResource, RedrawScheduler};
use crate::error::{FrameError, SetupError};
use crate::frame::{CancelToken, DriverState, FrameDriver, FrameSetup, TickOutcome};
use crate::geometry::{BoundGeometry, GeometryBinder, GeometryDescription};
use crate::pipeline::{PipelineBuilder, PipelineOptions, Program};
use crate::runtime::TimeSource;
use crate::transform::{Camera, RotationPolicy, UniformNames, WorldTransform};
use crate::types::{
    DrawMode, RendererConfig, ShaderSource, SurfaceSize, TextureHandle, TextureImage,
    DEFAULT_CLEAR_COLOR,
};

/// Fully loaded inputs for one scene: shaders, mesh, textures, and draw policy.
#[derive(Debug, Clone)]
pub struct SceneDescription {
    pub name: String,
    pub shaders: ShaderSource,
    pub geometry: GeometryDescription,
    pub textures: Vec<TextureImage>,
    pub draw_mode: DrawMode,
    /// Vertices or indices per draw; defaults to everything the geometry holds.
    pub draw_count: Option<u32>,
    pub camera: Camera,
    pub rotation: RotationPolicy,
    pub uniforms: UniformNames,
    pub clear_color: [f32; 4],
}

impl SceneDescription {
    pub fn new(name: impl Into<String>, shaders: ShaderSource, geometry: GeometryDescription) -> Self {
        Self {
            name: name.into(),
            shaders,
            geometry,
            textures: Vec::new(),
            draw_mode: DrawMode::Arrays,
            draw_count: None,
            camera: Camera::default(),
            rotation: RotationPolicy::default(),
            uniforms: UniformNames::default(),
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

/// A program, its geometry, and its textures, driven by one [`FrameDriver`].
///
/// Runs the bootstrap in order: build the program, bind geometry, upload
/// textures. Any failure releases what was created so far.
pub struct Scene {
    name: String,
    program: Program,
    geometry: BoundGeometry,
    textures: Vec<TextureHandle>,
    camera: Camera,
    draw_mode: DrawMode,
    draw_count: u32,
    driver: FrameDriver,
}

impl Scene {
    pub fn setup<B: GpuBackend + ?Sized>(
        backend: &mut B,
        description: SceneDescription,
        config: &RendererConfig,
    ) -> Result<Self, SetupError> {
        Self::setup_with_transform(backend, description, config, None)
    }

    /// Like [`setup`](Self::setup) with a custom world transform replacing the rotation policy.
    pub fn setup_with_transform<B: GpuBackend + ?Sized>(
        backend: &mut B,
        description: SceneDescription,
        config: &RendererConfig,
        transform: Option<Box<dyn WorldTransform>>,
    ) -> Result<Self, SetupError> {
        tracing::info!(scene = %description.name, "setting up scene");
        let builder = PipelineBuilder::new(PipelineOptions {
            validate: config.validate,
        });
        let program = builder.build(backend, &description.shaders)?;

        let geometry = match GeometryBinder::bind(backend, program.handle(), &description.geometry) {
            Ok(geometry) => geometry,
            Err(err) => {
                program.release(backend);
                return Err(err.into());
            }
        };

        let textures = match GeometryBinder::upload_textures(backend, &description.textures) {
            Ok(textures) => textures,
            Err(err) => {
                geometry.release(backend);
                program.release(backend);
                return Err(err.into());
            }
        };

        let draw_count = description.draw_count.unwrap_or(match description.draw_mode {
            DrawMode::Arrays => geometry.vertex_count,
            DrawMode::Indexed => geometry.indices.map(|indices| indices.count).unwrap_or(0),
        });

        let driver = match transform {
            Some(transform) => FrameDriver::new(transform),
            None => FrameDriver::new(description.rotation),
        }
        .with_uniform_names(description.uniforms)
        .with_clear_color(description.clear_color)
        .with_fault_policy(config.fault_policy);

        Ok(Self {
            name: description.name,
            program,
            geometry,
            textures,
            camera: description.camera,
            draw_mode: description.draw_mode,
            draw_count,
            driver,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn geometry(&self) -> &BoundGeometry {
        &self.geometry
    }

    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    pub fn world(&self) -> Mat4 {
        self.driver.transforms().world
    }

    /// Replaces the driver clock; takes effect at the next `start`.
    pub fn set_clock(&mut self, clock: impl TimeSource + 'static) {
        self.driver.set_clock(clock);
    }

    pub fn start<B, S>(
        &mut self,
        backend: &mut B,
        scheduler: &mut S,
        surface: SurfaceSize,
    ) -> Result<CancelToken, FrameError>
    where
        B: GpuBackend + ?Sized,
        S: RedrawScheduler + ?Sized,
    {
        let setup = FrameSetup {
            program: self.program.handle(),
            geometry: self.geometry.clone(),
            textures: self.textures.clone(),
            camera: self.camera.matrices(surface.aspect_ratio()),
            draw_count: self.draw_count,
            indexed: self.draw_mode == DrawMode::Indexed,
        };
        self.driver.start(backend, scheduler, setup)
    }

    pub fn tick<B, S>(&mut self, backend: &mut B, scheduler: &mut S) -> TickOutcome
    where
        B: GpuBackend + ?Sized,
        S: RedrawScheduler + ?Sized,
    {
        self.driver.tick(backend, scheduler)
    }

    /// Recomputes the projection for a new surface size.
    pub fn resize<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        surface: SurfaceSize,
    ) -> Result<(), FrameError> {
        let projection = self.camera.projection(surface.aspect_ratio());
        self.driver.set_projection(backend, projection)
    }

    pub fn stop(&mut self) {
        self.driver.stop();
    }

    /// Stops the loop and destroys every GPU object the scene created.
    pub fn release<B: GpuBackend + ?Sized>(mut self, backend: &mut B) {
        self.stop();
        for texture in self.textures.drain(..) {
            backend.release(GpuResource::Texture(texture));
        }
        self.geometry.release(backend);
        self.program.release(backend);
        tracing::debug!(scene = %self.name, "scene released");
    }
}
