mod common;

use renderer::{
    GeometryBinder, GeometryError, GpuBackend, HeadlessBackend, IndexData, PipelineBuilder,
    PipelineError, PipelineOptions, ShaderSource, ShaderStage,
};

fn validating() -> PipelineBuilder {
    PipelineBuilder::new(PipelineOptions { validate: true })
}

#[test]
fn malformed_vertex_source_never_reaches_linker() {
    let mut backend = HeadlessBackend::new();
    let broken = common::COLOR_VERTEX.replace("fragColor = vertColor;", "fragColor = vertColor");
    let source = ShaderSource::new(broken, common::COLOR_FRAGMENT);

    let err = validating().build(&mut backend, &source).unwrap_err();
    match &err {
        PipelineError::Compile { stage, log } => {
            assert_eq!(*stage, ShaderStage::Vertex);
            assert!(!log.is_empty());
        }
        other => panic!("expected a vertex compile error, got {other:?}"),
    }
    assert_eq!(backend.counts().compiles, 1);
    assert_eq!(backend.counts().links, 0);
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn fragment_compile_failure_releases_vertex_stage() {
    let mut backend = HeadlessBackend::new();
    let source = ShaderSource::new(common::COLOR_VERTEX, "#version 450\nvoid main() { oops }\n");

    let err = validating().build(&mut backend, &source).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Compile {
            stage: ShaderStage::Fragment,
            ..
        }
    ));
    assert_eq!(backend.counts().links, 0);
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn compatible_sources_produce_validated_program() {
    let mut backend = HeadlessBackend::new();
    let program = validating()
        .build(&mut backend, &common::color_shaders())
        .expect("program builds");

    assert!(program.is_validated());
    assert_eq!(backend.counts().validations, 1);
    assert_eq!(backend.attribute_location(program.handle(), "vertPosition"), Some(0));
    assert_eq!(backend.attribute_location(program.handle(), "vertColor"), Some(1));
    // shader objects are released once linked
    assert_eq!(backend.live_objects(), 1);
}

#[test]
fn validation_can_be_disabled() {
    let mut backend = HeadlessBackend::new();
    let program = PipelineBuilder::new(PipelineOptions { validate: false })
        .build(&mut backend, &common::color_shaders())
        .unwrap();

    assert!(!program.is_validated());
    assert_eq!(backend.counts().validations, 0);
}

#[test]
fn mismatched_interfaces_fail_to_link() {
    let mut backend = HeadlessBackend::new();
    let source = ShaderSource::new(common::COLOR_VERTEX, common::TEXTURED_FRAGMENT);

    let err = validating().build(&mut backend, &source).unwrap_err();
    assert!(matches!(err, PipelineError::Link { .. }), "{err}");
    assert!(err.log().contains("location 0"), "{}", err.log());
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn misplaced_uniform_block_fails_validation() {
    let mut backend = HeadlessBackend::new();
    let vertex = common::COLOR_VERTEX.replace("set = 0, binding = 0", "set = 2, binding = 3");
    let source = ShaderSource::new(vertex, common::COLOR_FRAGMENT);

    let err = validating().build(&mut backend, &source).unwrap_err();
    assert!(matches!(err, PipelineError::Validate { .. }), "{err}");
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn out_of_range_index_is_rejected_before_upload() {
    let mut backend = HeadlessBackend::new();
    let program = validating()
        .build(&mut backend, &common::textured_shaders())
        .unwrap();
    let mut cube = common::cube();
    let mut indices = match cube.indices.take() {
        Some(IndexData::Uint16(indices)) => indices,
        other => panic!("cube fixture has unexpected indices {other:?}"),
    };
    indices[7] = 24;
    cube.indices = Some(IndexData::Uint16(indices));

    let err = GeometryBinder::bind(&mut backend, program.handle(), &cube).unwrap_err();
    match err {
        GeometryError::IndexOutOfRange {
            index,
            position,
            vertex_count,
        } => {
            assert_eq!((index, position, vertex_count), (24, 7, 24));
        }
        other => panic!("expected index error, got {other:?}"),
    }
    assert_eq!(backend.live_objects(), 1);
    assert!(backend.draw_calls().is_empty());
}

#[test]
fn unused_attribute_is_skipped_not_fatal() {
    let mut backend = HeadlessBackend::new();
    let program = validating()
        .build(&mut backend, &common::color_shaders())
        .unwrap();
    let mut triangle = common::triangle();
    triangle
        .buffers
        .push(renderer::VertexBufferData::new(vec![0.0, 0.0, 1.0].repeat(3)));
    triangle.attributes.push(renderer::AttributeBinding {
        buffer: 1,
        layout: renderer::AttributeLayout::new("vertNormal", 3, 0, 0),
    });

    let bound = GeometryBinder::bind(&mut backend, program.handle(), &triangle).unwrap();
    assert_eq!(bound.skipped, vec!["vertNormal".to_string()]);
    assert_eq!(bound.attributes.len(), 2);
    assert_eq!(bound.vertex_count, 3);
    assert_eq!(bound.buffers.len(), 2);
}

#[test]
fn declared_input_without_layout_fails_bind() {
    let mut backend = HeadlessBackend::new();
    let vertex = common::COLOR_VERTEX.replace(
        "layout(location = 1) in vec3 vertColor;",
        "layout(location = 1) in vec3 vertColor;\nlayout(location = 2) in vec3 vertNormal;",
    );
    let source = ShaderSource::new(vertex, common::COLOR_FRAGMENT);
    let program = validating().build(&mut backend, &source).unwrap();
    assert_eq!(backend.attribute_location(program.handle(), "vertNormal"), Some(2));

    let err = GeometryBinder::bind(&mut backend, program.handle(), &common::triangle()).unwrap_err();
    match err {
        GeometryError::UnboundInput { name, location } => {
            assert_eq!((name.as_str(), location), ("vertNormal", 2));
        }
        other => panic!("expected unbound input, got {other:?}"),
    }
    assert_eq!(backend.live_objects(), 1);
    assert!(backend.draw_calls().is_empty());
}
