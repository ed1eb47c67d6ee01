//! wgpu implementation of [`GpuBackend`](crate::GpuBackend).
//!
//! - `context` owns instance/device/surface wiring plus the depth and MSAA
//!   targets, and rebuilds them when the window resizes.
//! - `pipeline` holds the shared bind group layouts and turns a linked program
//!   plus its attribute layouts into a render pipeline.
//! - `texture` uploads images and provides the placeholder for unbound units.
//! - `uniforms` mirrors each program's uniform block on the CPU and flushes it
//!   once per frame.
//! - `backend` ties them together behind the handle-based backend trait.

mod backend;
mod context;
mod pipeline;
mod texture;
mod uniforms;

pub use backend::WgpuBackend;
