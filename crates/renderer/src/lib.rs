//! Renderer crate for meshspin.
//!
//! Turns a pair of GLSL sources and static mesh data into a program, bound
//! geometry, and a redraw loop. The flow is strictly forward:
//!
//! ```text
//!   ShaderSource ──▶ PipelineBuilder::build ──▶ Program
//!                                                  │
//!   GeometryDescription ──▶ GeometryBinder::bind ──┴──▶ BoundGeometry
//!                                                          │
//!   Camera + RotationPolicy ──▶ FrameDriver::start ◀───────┘
//!                                   │
//!                                   └─▶ tick(): world ─▶ clear ─▶ textures ─▶ draw
//!                                        ▲                                    │
//!                                        └──── RedrawScheduler ◀──────────────┘
//! ```
//!
//! Every GPU call goes through [`GpuBackend`], which names the object it
//! configures. [`WgpuBackend`] renders into a winit window; [`HeadlessBackend`]
//! records commands so the same setup and frame code runs without a GPU.
//! [`Scene`] bundles the whole sequence for callers that only have a
//! [`SceneDescription`].

mod backend;
mod error;
mod frame;
mod geometry;
mod gpu;
mod headless;
mod pipeline;
mod runtime;
mod scene;
mod shader;
mod transform;
mod types;
mod window;

pub use backend::{GpuBackend, GpuResource, RedrawScheduler};
pub use error::{BackendError, FrameError, GeometryError, PipelineError, SetupError};
pub use frame::{CancelToken, DriverState, FrameDriver, FrameSetup, TickOutcome};
pub use geometry::{
    ActiveAttribute, AttributeBinding, BoundGeometry, BoundIndices, GeometryBinder,
    GeometryDescription, IndexData, VertexBufferData,
};
pub use gpu::WgpuBackend;
pub use headless::{CallCounts, Command, HeadlessBackend, ManualScheduler};
pub use pipeline::{PipelineBuilder, PipelineOptions, Program};
pub use runtime::{
    BoxedTimeSource, FixedTimeSource, SteppedTimeSource, SystemTimeSource, TimeSample, TimeSource,
};
pub use scene::{Scene, SceneDescription};
pub use shader::{ProgramInterface, ResourceKind, ResourceSlot, UniformBlock, UniformMatrix, VertexInput};
pub use transform::{
    Camera, CameraMatrices, RotationPolicy, TransformState, UniformNames, WorldTransform,
    DEFAULT_ROTATION_PERIOD,
};
pub use types::*;
pub use window::run_window;
