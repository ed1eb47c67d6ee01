use crate::backend::{GpuBackend, GpuResource};
use crate::error::PipelineError;
use crate::types::{ProgramHandle, ShaderSource, ShaderStage};

/// Knobs for program construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Run the (expensive) validation pass after linking.
    pub validate: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            validate: cfg!(debug_assertions),
        }
    }
}

/// A linked program owned by whoever drives frames with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    handle: ProgramHandle,
    validated: bool,
}

impl Program {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn release<B: GpuBackend + ?Sized>(self, backend: &mut B) {
        backend.release(GpuResource::Program(self.handle));
    }
}

/// Compiles, links, and optionally validates a vertex/fragment pair.
///
/// Every step is terminal on failure: a stage that fails to compile never
/// reaches the linker, and intermediate objects are released before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineBuilder {
    options: PipelineOptions,
}

impl PipelineBuilder {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn build<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        source: &ShaderSource,
    ) -> Result<Program, PipelineError> {
        let vertex = compile(backend, ShaderStage::Vertex, source)?;
        let fragment = match compile(backend, ShaderStage::Fragment, source) {
            Ok(handle) => handle,
            Err(err) => {
                backend.release(GpuResource::Shader(vertex));
                return Err(err);
            }
        };

        let linked = backend.link_program(vertex, fragment);
        backend.release(GpuResource::Shader(vertex));
        backend.release(GpuResource::Shader(fragment));
        let handle = linked.map_err(|log| PipelineError::Link { log })?;

        if self.options.validate {
            if let Err(log) = backend.validate_program(handle) {
                backend.release(GpuResource::Program(handle));
                return Err(PipelineError::Validate { log });
            }
        } else {
            tracing::debug!("program validation skipped");
        }

        tracing::info!(program = handle.index(), validated = self.options.validate, "program ready");
        Ok(Program {
            handle,
            validated: self.options.validate,
        })
    }
}

fn compile<B: GpuBackend + ?Sized>(
    backend: &mut B,
    stage: ShaderStage,
    source: &ShaderSource,
) -> Result<crate::types::ShaderHandle, PipelineError> {
    backend
        .compile_shader(stage, source.stage(stage))
        .map_err(|log| PipelineError::Compile { stage, log })
}
