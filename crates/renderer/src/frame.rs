//! Continuous redraw loop with per-frame uniform updates.
//!
//! The driver is a two-state machine. `start` captures a [`CancelToken`],
//! uploads the fixed camera matrices, and registers the first tick with the
//! host's [`RedrawScheduler`]. Each tick then runs to completion and
//! re-registers itself only while the token is live, so `stop` (or cancelling
//! the token from elsewhere) guarantees no further draw after the current tick.
//!
//! ```text
//!           start()                      tick(): token live
//!   Idle ─────────────▶ Running ◀───────────────────────┐
//!    ▲                     │  sample clock, upload world │
//!    │   stop() / cancel   │  clear, bind, draw, finish  │
//!    └─────────────────────┴──────────── schedule_redraw ┘
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::Mat4;

use crate::backend::{GpuBackend, RedrawScheduler};
use crate::error::FrameError;
use crate::geometry::BoundGeometry;
use crate::runtime::{BoxedTimeSource, SystemTimeSource, TimeSource};
use crate::transform::{CameraMatrices, TransformState, UniformNames, WorldTransform};
use crate::types::{
    DrawCall, FaultPolicy, ProgramHandle, TextureHandle, DEFAULT_CLEAR_COLOR, MAX_TEXTURE_UNITS,
};

/// Shared cancellation flag for one running session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Everything `start` needs to drive frames.
#[derive(Debug, Clone)]
pub struct FrameSetup {
    pub program: ProgramHandle,
    pub geometry: BoundGeometry,
    pub textures: Vec<TextureHandle>,
    pub camera: CameraMatrices,
    pub draw_count: u32,
    pub indexed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
}

/// Result of a single [`FrameDriver::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was submitted and the next tick is scheduled.
    Drawn,
    /// The frame failed and was dropped; the next tick is scheduled.
    Skipped,
    /// The driver is idle; nothing was drawn and nothing was scheduled.
    Stopped,
}

struct Session {
    program: ProgramHandle,
    textures: Vec<TextureHandle>,
    call: DrawCall,
    token: CancelToken,
}

pub struct FrameDriver {
    state: DriverState,
    session: Option<Session>,
    transform: Box<dyn WorldTransform>,
    clock: BoxedTimeSource,
    transforms: TransformState,
    uniforms: UniformNames,
    clear_color: [f32; 4],
    fault_policy: FaultPolicy,
    missing_world_reported: bool,
    stats: FrameStats,
}

impl FrameDriver {
    pub fn new(transform: impl WorldTransform + 'static) -> Self {
        Self {
            state: DriverState::Idle,
            session: None,
            transform: Box::new(transform),
            clock: Box::new(SystemTimeSource::new()),
            transforms: TransformState::default(),
            uniforms: UniformNames::default(),
            clear_color: DEFAULT_CLEAR_COLOR,
            fault_policy: FaultPolicy::default(),
            missing_world_reported: false,
            stats: FrameStats::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl TimeSource + 'static) -> Self {
        self.set_clock(clock);
        self
    }

    /// Replaces the clock; it is reset on the next `start`.
    pub fn set_clock(&mut self, clock: impl TimeSource + 'static) {
        self.clock = Box::new(clock);
    }

    pub fn with_uniform_names(mut self, uniforms: UniformNames) -> Self {
        self.uniforms = uniforms;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn transforms(&self) -> &TransformState {
        &self.transforms
    }

    /// Validates the draw, uploads view/projection, and schedules the first tick.
    pub fn start<B, S>(
        &mut self,
        backend: &mut B,
        scheduler: &mut S,
        setup: FrameSetup,
    ) -> Result<CancelToken, FrameError>
    where
        B: GpuBackend + ?Sized,
        S: RedrawScheduler + ?Sized,
    {
        if setup.textures.len() > MAX_TEXTURE_UNITS {
            return Err(FrameError::TooManyTextures(setup.textures.len()));
        }
        let call = draw_call(&setup)?;

        self.stop();
        self.transforms.view = setup.camera.view;
        self.transforms.projection = setup.camera.projection;
        self.upload_matrix(backend, setup.program, MatrixSlot::View)?;
        self.upload_matrix(backend, setup.program, MatrixSlot::Projection)?;

        let token = CancelToken::new();
        self.session = Some(Session {
            program: setup.program,
            textures: setup.textures,
            call,
            token: token.clone(),
        });
        self.clock.reset();
        self.stats = FrameStats::default();
        self.missing_world_reported = false;
        self.state = DriverState::Running;
        tracing::info!(draw = ?call, "frame driver running");
        scheduler.schedule_redraw();
        Ok(token)
    }

    /// Runs one frame. Called by the host each time a scheduled redraw fires.
    pub fn tick<B, S>(&mut self, backend: &mut B, scheduler: &mut S) -> TickOutcome
    where
        B: GpuBackend + ?Sized,
        S: RedrawScheduler + ?Sized,
    {
        let cancelled = match &self.session {
            Some(session) => session.token.is_cancelled(),
            None => true,
        };
        if self.state == DriverState::Idle || cancelled {
            if self.state == DriverState::Running {
                tracing::debug!("frame driver cancelled");
            }
            self.state = DriverState::Idle;
            self.session = None;
            return TickOutcome::Stopped;
        }

        let outcome = match self.render(backend) {
            Ok(()) => {
                self.stats.record(Instant::now());
                TickOutcome::Drawn
            }
            Err(err) => {
                tracing::error!(error = %err, policy = ?self.fault_policy, "frame failed");
                match self.fault_policy {
                    FaultPolicy::SkipFrame => TickOutcome::Skipped,
                    FaultPolicy::Stop => {
                        self.stop();
                        return TickOutcome::Stopped;
                    }
                }
            }
        };

        match &self.session {
            Some(session) if !session.token.is_cancelled() => {
                tracing::trace!("scheduling next frame");
                scheduler.schedule_redraw();
                outcome
            }
            _ => {
                self.state = DriverState::Idle;
                self.session = None;
                outcome
            }
        }
    }

    /// Returns to idle and cancels the pending next-tick registration.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.token.cancel();
            tracing::info!(frames = self.stats.total, "frame driver stopped");
        }
        self.state = DriverState::Idle;
    }

    /// Replaces the projection, e.g. after the surface was resized.
    pub fn set_projection<B>(&mut self, backend: &mut B, projection: Mat4) -> Result<(), FrameError>
    where
        B: GpuBackend + ?Sized,
    {
        self.transforms.projection = projection;
        match self.session.as_ref().map(|session| session.program) {
            Some(program) => self.upload_matrix(backend, program, MatrixSlot::Projection),
            None => Ok(()),
        }
    }

    fn render<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), FrameError> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let program = session.program;
        let call = session.call;
        let textures = session.textures.clone();

        let sample = self.clock.sample();
        self.transforms.world = self.transform.world(sample.seconds);
        self.upload_matrix(backend, program, MatrixSlot::World)?;

        backend.clear(self.clear_color);
        for (unit, texture) in textures.into_iter().enumerate() {
            backend.bind_texture(unit as u32, texture)?;
        }
        backend.draw(program, call)?;
        backend.finish_frame()?;
        Ok(())
    }

    fn upload_matrix<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        program: ProgramHandle,
        slot: MatrixSlot,
    ) -> Result<(), FrameError> {
        let (name, value) = match slot {
            MatrixSlot::World => (&self.uniforms.world, &self.transforms.world),
            MatrixSlot::View => (&self.uniforms.view, &self.transforms.view),
            MatrixSlot::Projection => (&self.uniforms.projection, &self.transforms.projection),
        };
        let found = backend.set_uniform_matrix(program, name, value)?;
        if !found {
            let first_world_miss = slot == MatrixSlot::World && !self.missing_world_reported;
            if slot != MatrixSlot::World || first_world_miss {
                tracing::warn!(uniform = %name, "program has no such mat4 uniform; ignoring");
            }
            if first_world_miss {
                self.missing_world_reported = true;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatrixSlot {
    World,
    View,
    Projection,
}

fn draw_call(setup: &FrameSetup) -> Result<DrawCall, FrameError> {
    if setup.indexed {
        let indices = setup
            .geometry
            .indices
            .ok_or(FrameError::MissingIndexBuffer)?;
        if setup.draw_count > indices.count {
            return Err(FrameError::DrawCountOutOfRange {
                requested: setup.draw_count,
                available: indices.count,
                unit: "indices",
            });
        }
        Ok(DrawCall::Indexed {
            buffer: indices.buffer,
            count: setup.draw_count,
            format: indices.format,
            offset: 0,
        })
    } else {
        if setup.draw_count > setup.geometry.vertex_count {
            return Err(FrameError::DrawCountOutOfRange {
                requested: setup.draw_count,
                available: setup.geometry.vertex_count,
                unit: "vertices",
            });
        }
        Ok(DrawCall::Arrays {
            first: 0,
            count: setup.draw_count,
        })
    }
}

/// Counts frames and logs the rate once per second.
#[derive(Debug, Default)]
struct FrameStats {
    total: u64,
    window_frames: u32,
    window_start: Option<Instant>,
}

impl FrameStats {
    fn record(&mut self, now: Instant) {
        self.total += 1;
        self.window_frames += 1;
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= Duration::from_secs(1) {
            let fps = f64::from(self.window_frames) / elapsed.as_secs_f64();
            tracing::debug!(fps, total = self.total, "frame rate");
            self.window_frames = 0;
            self.window_start = Some(now);
        }
    }
}
