//! GLSL front end and program reflection shared by every backend.
//!
//! Compilation runs the naga GLSL parser, linking matches the vertex outputs
//! against the fragment inputs, and validation runs the naga validator plus the
//! binding rules the renderer relies on:
//!
//! - at most one uniform block, declared at `set = 0, binding = 0`;
//! - textures at `set = 1, binding = 2n`, their samplers at `binding = 2n + 1`;
//! - vertex inputs are 32-bit float scalars or vectors.

use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::types::{ShaderStage, MAX_TEXTURE_UNITS};

pub(crate) const UNIFORM_GROUP: u32 = 0;
pub(crate) const UNIFORM_BINDING: u32 = 0;
pub(crate) const TEXTURE_GROUP: u32 = 1;

const ENTRY_POINT: &str = "main";
const MATRIX_BYTES: u32 = 64;

/// A parsed stage plus the text it came from, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub module: naga::Module,
    pub source: String,
}

/// Parses one GLSL stage. The error string is the rendered compiler log.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(naga_stage(stage));
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| errors.emit_to_string(source))?;
    tracing::debug!(
        %stage,
        types = module.types.len(),
        globals = module.global_variables.len(),
        "compiled shader stage"
    );
    Ok(CompiledStage {
        stage,
        module,
        source: source.to_string(),
    })
}

pub(crate) fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Per-vertex input of the vertex stage.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInput {
    pub name: String,
    pub location: u32,
    /// Component count, or `None` when the input is not a float scalar/vector.
    pub components: Option<u32>,
}

/// A `mat4` member of a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMatrix {
    pub name: String,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: Option<String>,
    pub group: u32,
    pub binding: u32,
    /// Size of the block in bytes.
    pub size: u32,
    pub matrices: Vec<UniformMatrix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Texture,
    Sampler,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: Option<String>,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Everything a backend needs to know about a linked program's interface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramInterface {
    pub inputs: Vec<VertexInput>,
    pub uniforms: Vec<UniformBlock>,
    pub resources: Vec<ResourceSlot>,
}

impl ProgramInterface {
    pub fn input(&self, name: &str) -> Option<&VertexInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Finds a `mat4` uniform by member name across every block.
    pub fn matrix(&self, name: &str) -> Option<(&UniformBlock, &UniformMatrix)> {
        self.uniforms.iter().find_map(|block| {
            block
                .matrices
                .iter()
                .find(|matrix| matrix.name == name)
                .map(|matrix| (block, matrix))
        })
    }

    /// Size of the block at `set = 0, binding = 0`, if the program declares one.
    pub fn uniform_block_size(&self) -> Option<u32> {
        self.uniforms
            .iter()
            .find(|block| block.group == UNIFORM_GROUP && block.binding == UNIFORM_BINDING)
            .map(|block| block.size)
    }
}

/// A vertex and fragment stage that passed interface matching.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
    pub interface: ProgramInterface,
}

/// Matches stage interfaces. The error string is the rendered linker log.
pub fn link_stages(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<LinkedProgram, String> {
    let mut log = Vec::new();
    if vertex.stage != ShaderStage::Vertex {
        log.push(format!("expected a vertex stage, got {}", vertex.stage));
    }
    if fragment.stage != ShaderStage::Fragment {
        log.push(format!("expected a fragment stage, got {}", fragment.stage));
    }

    let vertex_entry = entry_point(&vertex.module, naga::ShaderStage::Vertex);
    let fragment_entry = entry_point(&fragment.module, naga::ShaderStage::Fragment);
    if vertex_entry.is_none() {
        log.push(format!("vertex stage has no '{ENTRY_POINT}' entry point"));
    }
    if fragment_entry.is_none() {
        log.push(format!("fragment stage has no '{ENTRY_POINT}' entry point"));
    }

    if let (Some(vertex_entry), Some(fragment_entry)) = (vertex_entry, fragment_entry) {
        let outputs = stage_outputs(&vertex.module, vertex_entry);
        for (location, name, inner) in stage_inputs(&fragment.module, fragment_entry) {
            match outputs.iter().find(|(out_location, _, _)| *out_location == location) {
                None => log.push(format!(
                    "fragment input '{}' at location {location} is not written by the vertex stage",
                    name.as_deref().unwrap_or("<unnamed>")
                )),
                Some((_, _, out_inner)) if *out_inner != inner => log.push(format!(
                    "fragment input '{}' at location {location} does not match the vertex output type",
                    name.as_deref().unwrap_or("<unnamed>")
                )),
                Some(_) => {}
            }
        }
    }

    let mut interface = ProgramInterface::default();
    if let Some(entry) = vertex_entry {
        interface.inputs = stage_inputs(&vertex.module, entry)
            .into_iter()
            .map(|(location, name, inner)| VertexInput {
                name: name.unwrap_or_default(),
                location,
                components: float_components(&inner),
            })
            .collect();
    }

    for stage in [vertex, fragment] {
        for block in uniform_blocks(&stage.module) {
            match interface
                .uniforms
                .iter()
                .find(|existing| existing.group == block.group && existing.binding == block.binding)
            {
                Some(existing) if existing.size != block.size => log.push(format!(
                    "uniform block at set {} binding {} is declared with {} bytes in one stage and {} in another",
                    block.group, block.binding, existing.size, block.size
                )),
                Some(_) => {}
                None => interface.uniforms.push(block),
            }
        }
        for slot in resource_slots(&stage.module) {
            if !interface
                .resources
                .iter()
                .any(|existing| existing.group == slot.group && existing.binding == slot.binding)
            {
                interface.resources.push(slot);
            }
        }
    }

    if !log.is_empty() {
        return Err(log.join("\n"));
    }

    tracing::debug!(
        inputs = interface.inputs.len(),
        uniform_blocks = interface.uniforms.len(),
        resources = interface.resources.len(),
        "linked program"
    );
    Ok(LinkedProgram {
        vertex: vertex.clone(),
        fragment: fragment.clone(),
        interface,
    })
}

/// Runs the naga validator on both stages and checks the binding rules.
pub fn validate_linked(program: &LinkedProgram) -> Result<(), String> {
    let mut log = Vec::new();
    for stage in [&program.vertex, &program.fragment] {
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        if let Err(err) = validator.validate(&stage.module) {
            log.push(format!("{} stage: {}", stage.stage, err.emit_to_string(&stage.source)));
        }
    }

    let interface = &program.interface;
    for input in &interface.inputs {
        if input.components.is_none() {
            log.push(format!(
                "vertex input '{}' at location {} is not a 32-bit float scalar or vector",
                input.name, input.location
            ));
        }
    }
    for block in &interface.uniforms {
        if block.group != UNIFORM_GROUP || block.binding != UNIFORM_BINDING {
            log.push(format!(
                "uniform block {} must be declared at set {UNIFORM_GROUP} binding {UNIFORM_BINDING}, found set {} binding {}",
                block.name.as_deref().unwrap_or("<unnamed>"),
                block.group,
                block.binding
            ));
        }
    }
    for slot in &interface.resources {
        let label = slot.name.as_deref().unwrap_or("<unnamed>");
        let expected_parity = match slot.kind {
            ResourceKind::Texture => 0,
            ResourceKind::Sampler => 1,
            ResourceKind::Other => {
                log.push(format!("resource '{label}' is neither a 2D texture nor a sampler"));
                continue;
            }
        };
        if slot.group != TEXTURE_GROUP
            || slot.binding % 2 != expected_parity
            || slot.binding as usize >= MAX_TEXTURE_UNITS * 2
        {
            log.push(format!(
                "resource '{label}' at set {} binding {} is outside the texture unit layout",
                slot.group, slot.binding
            ));
        }
    }

    if log.is_empty() {
        Ok(())
    } else {
        Err(log.join("\n"))
    }
}

fn entry_point(module: &naga::Module, stage: naga::ShaderStage) -> Option<&naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage && entry.name == ENTRY_POINT)
}

fn stage_inputs(
    module: &naga::Module,
    entry: &naga::EntryPoint,
) -> Vec<(u32, Option<String>, naga::TypeInner)> {
    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        match (&argument.binding, &module.types[argument.ty].inner) {
            (Some(naga::Binding::Location { location, .. }), inner) => {
                inputs.push((*location, argument.name.clone(), inner.clone()));
            }
            (None, naga::TypeInner::Struct { members, .. }) => {
                collect_located_members(module, members, &mut inputs);
            }
            _ => {}
        }
    }
    inputs.sort_by_key(|(location, _, _)| *location);
    inputs
}

fn stage_outputs(
    module: &naga::Module,
    entry: &naga::EntryPoint,
) -> Vec<(u32, Option<String>, naga::TypeInner)> {
    let mut outputs = Vec::new();
    if let Some(result) = &entry.function.result {
        match (&result.binding, &module.types[result.ty].inner) {
            (Some(naga::Binding::Location { location, .. }), inner) => {
                outputs.push((*location, None, inner.clone()));
            }
            (None, naga::TypeInner::Struct { members, .. }) => {
                collect_located_members(module, members, &mut outputs);
            }
            _ => {}
        }
    }
    outputs
}

fn collect_located_members(
    module: &naga::Module,
    members: &[naga::StructMember],
    out: &mut Vec<(u32, Option<String>, naga::TypeInner)>,
) {
    for member in members {
        if let Some(naga::Binding::Location { location, .. }) = member.binding {
            out.push((location, member.name.clone(), module.types[member.ty].inner.clone()));
        }
    }
}

fn float_components(inner: &naga::TypeInner) -> Option<u32> {
    match *inner {
        naga::TypeInner::Scalar(scalar) if scalar == naga::Scalar::F32 => Some(1),
        naga::TypeInner::Vector { size, scalar } if scalar == naga::Scalar::F32 => Some(size as u32),
        _ => None,
    }
}

fn uniform_blocks(module: &naga::Module) -> Vec<UniformBlock> {
    let mut blocks = Vec::new();
    for (_, global) in module.global_variables.iter() {
        if global.space != naga::AddressSpace::Uniform {
            continue;
        }
        let Some(binding) = &global.binding else {
            continue;
        };
        let ty = &module.types[global.ty];
        let (size, matrices) = match &ty.inner {
            naga::TypeInner::Struct { members, span } => {
                let matrices = members
                    .iter()
                    .filter(|member| is_mat4(&module.types[member.ty].inner))
                    .filter_map(|member| {
                        member.name.clone().map(|name| UniformMatrix {
                            name,
                            offset: member.offset,
                        })
                    })
                    .collect();
                (*span, matrices)
            }
            inner if is_mat4(inner) => (
                MATRIX_BYTES,
                global
                    .name
                    .clone()
                    .map(|name| vec![UniformMatrix { name, offset: 0 }])
                    .unwrap_or_default(),
            ),
            _ => (0, Vec::new()),
        };
        blocks.push(UniformBlock {
            name: ty.name.clone().or_else(|| global.name.clone()),
            group: binding.group,
            binding: binding.binding,
            size,
            matrices,
        });
    }
    blocks
}

fn is_mat4(inner: &naga::TypeInner) -> bool {
    matches!(
        *inner,
        naga::TypeInner::Matrix {
            columns: naga::VectorSize::Quad,
            rows: naga::VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32
    )
}

fn resource_slots(module: &naga::Module) -> Vec<ResourceSlot> {
    module
        .global_variables
        .iter()
        .filter(|(_, global)| global.space == naga::AddressSpace::Handle)
        .filter_map(|(_, global)| {
            let binding = global.binding.as_ref()?;
            let kind = match module.types[global.ty].inner {
                naga::TypeInner::Image {
                    dim: naga::ImageDimension::D2,
                    arrayed: false,
                    ..
                } => ResourceKind::Texture,
                naga::TypeInner::Sampler { comparison: false } => ResourceKind::Sampler,
                _ => ResourceKind::Other,
            };
            Some(ResourceSlot {
                name: global.name.clone(),
                group: binding.group,
                binding: binding.binding,
                kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec3 vertPosition;
layout(location = 1) in vec2 vertTexCoord;
layout(location = 0) out vec2 fragTexCoord;

layout(std140, set = 0, binding = 0) uniform Transform {
    mat4 mWorld;
    mat4 mView;
    mat4 mProj;
};

void main() {
    fragTexCoord = vertTexCoord;
    gl_Position = mProj * mView * mWorld * vec4(vertPosition, 1.0);
}
";

    const FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 fragTexCoord;
layout(location = 0) out vec4 outColor;

layout(set = 1, binding = 0) uniform texture2D sampler0_texture;
layout(set = 1, binding = 1) uniform sampler sampler0;

void main() {
    outColor = texture(sampler2D(sampler0_texture, sampler0), fragTexCoord);
}
";

    #[test]
    fn reflects_inputs_uniforms_and_textures() {
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX).unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, FRAGMENT).unwrap();
        let linked = link_stages(&vertex, &fragment).unwrap();

        let position = linked.interface.input("vertPosition").unwrap();
        assert_eq!(position.location, 0);
        assert_eq!(position.components, Some(3));
        assert_eq!(linked.interface.input("vertTexCoord").unwrap().components, Some(2));

        let (block, world) = linked.interface.matrix("mWorld").unwrap();
        assert_eq!((block.group, block.binding), (0, 0));
        assert_eq!(world.offset, 0);
        assert_eq!(linked.interface.matrix("mProj").unwrap().1.offset, 128);
        assert_eq!(linked.interface.uniform_block_size(), Some(192));
        assert_eq!(linked.interface.resources.len(), 2);

        validate_linked(&linked).unwrap();
    }

    #[test]
    fn compile_error_carries_log() {
        let broken = VERTEX.replace("fragTexCoord = vertTexCoord;", "fragTexCoord = vertTexCoord");
        let log = compile_stage(ShaderStage::Vertex, &broken).unwrap_err();
        assert!(!log.is_empty());
    }

    #[test]
    fn link_rejects_unwritten_fragment_input() {
        let vertex = compile_stage(
            ShaderStage::Vertex,
            r"#version 450
layout(location = 0) in vec3 vertPosition;
void main() { gl_Position = vec4(vertPosition, 1.0); }
",
        )
        .unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, FRAGMENT).unwrap();
        let log = link_stages(&vertex, &fragment).unwrap_err();
        assert!(log.contains("location 0"), "{log}");
    }

    #[test]
    fn validation_flags_misplaced_uniform_block() {
        let vertex = compile_stage(
            ShaderStage::Vertex,
            &VERTEX.replace("set = 0, binding = 0", "set = 2, binding = 3"),
        )
        .unwrap();
        let fragment = compile_stage(ShaderStage::Fragment, FRAGMENT).unwrap();
        let linked = link_stages(&vertex, &fragment).unwrap();
        let log = validate_linked(&linked).unwrap_err();
        assert!(log.contains("set 2 binding 3"), "{log}");
    }
}
