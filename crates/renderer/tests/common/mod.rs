#![allow(dead_code)]

use renderer::{
    AttributeBinding, AttributeLayout, DrawMode, GeometryDescription, IndexData, ShaderSource,
    TextureImage, VertexBufferData,
};

pub const COLOR_VERTEX: &str = r"#version 450
layout(location = 0) in vec3 vertPosition;
layout(location = 1) in vec3 vertColor;
layout(location = 0) out vec3 fragColor;

layout(std140, set = 0, binding = 0) uniform Transform {
    mat4 mWorld;
    mat4 mView;
    mat4 mProj;
};

void main() {
    fragColor = vertColor;
    gl_Position = mProj * mView * mWorld * vec4(vertPosition, 1.0);
}
";

pub const COLOR_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec3 fragColor;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(fragColor, 1.0);
}
";

pub const TEXTURED_VERTEX: &str = r"#version 450
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

pub const TEXTURED_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 fragTexCoord;
layout(location = 0) out vec4 outColor;

layout(set = 1, binding = 0) uniform texture2D sampler0_texture;
layout(set = 1, binding = 1) uniform sampler sampler0;

void main() {
    outColor = texture(sampler2D(sampler0_texture, sampler0), fragTexCoord);
}
";

pub fn color_shaders() -> ShaderSource {
    ShaderSource::new(COLOR_VERTEX, COLOR_FRAGMENT)
}

pub fn textured_shaders() -> ShaderSource {
    ShaderSource::new(TEXTURED_VERTEX, TEXTURED_FRAGMENT)
}

/// Position and color interleaved, six floats per vertex.
pub fn triangle() -> GeometryDescription {
    #[rustfmt::skip]
    let data = vec![
         0.0,  1.0, 0.0,   1.0, 1.0, 0.0,
        -1.0, -1.0, 0.0,   0.7, 0.0, 1.0,
         1.0, -1.0, 0.0,   0.1, 1.0, 0.6,
    ];
    GeometryDescription {
        buffers: vec![VertexBufferData::new(data)],
        attributes: vec![
            AttributeBinding {
                buffer: 0,
                layout: AttributeLayout::new("vertPosition", 3, 24, 0),
            },
            AttributeBinding {
                buffer: 0,
                layout: AttributeLayout::new("vertColor", 3, 24, 12),
            },
        ],
        ..GeometryDescription::default()
    }
}

/// Unit cube with four vertices per face (position + uv) and two triangles per face.
pub fn cube() -> GeometryDescription {
    let faces: [[[f32; 3]; 4]; 6] = [
        [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]],
        [[-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0]],
        [[1.0, 1.0, 1.0], [1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0]],
        [[1.0, 1.0, 1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0]],
        [[1.0, 1.0, -1.0], [1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0]],
        [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, -1.0, -1.0]],
    ];
    let uvs = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];

    let mut data = Vec::with_capacity(24 * 5);
    let mut indices = Vec::with_capacity(36);
    for (face, corners) in faces.iter().enumerate() {
        for (corner, uv) in corners.iter().zip(uvs.iter()) {
            data.extend_from_slice(corner);
            data.extend_from_slice(uv);
        }
        let base = (face * 4) as u16;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    GeometryDescription {
        buffers: vec![VertexBufferData::new(data)],
        attributes: vec![
            AttributeBinding {
                buffer: 0,
                layout: AttributeLayout::new("vertPosition", 3, 20, 0),
            },
            AttributeBinding {
                buffer: 0,
                layout: AttributeLayout::new("vertTexCoord", 2, 20, 12),
            },
        ],
        indices: Some(IndexData::Uint16(indices)),
        ..GeometryDescription::default()
    }
}

pub fn checker_texture() -> TextureImage {
    let pixels = image::RgbaImage::from_fn(2, 2, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([40, 40, 40, 255])
        }
    });
    TextureImage::new("checker", pixels)
}

pub fn cube_scene() -> renderer::SceneDescription {
    let mut description = renderer::SceneDescription::new("cube", textured_shaders(), cube());
    description.textures.push(checker_texture());
    description.draw_mode = DrawMode::Indexed;
    description
}
