use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const VERTEX: &str = r"#version 450
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

const FRAGMENT: &str = r"#version 450
layout(location = 0) in vec3 fragColor;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(fragColor, 1.0);
}
";

const MANIFEST: &str = r#"
name = "tri"

[shaders]
vertex = "shader.vs.glsl"
fragment = "shader.fs.glsl"

[[buffers]]
data = [
     0.0,  1.0, 0.0,   1.0, 1.0, 0.0,
    -1.0, -1.0, 0.0,   0.7, 0.0, 1.0,
     1.0, -1.0, 0.0,   0.1, 1.0, 0.6,
]

[[attributes]]
name = "vertPosition"
components = 3
stride = 24
offset = 0

[[attributes]]
name = "vertColor"
components = 3
stride = 24
offset = 12

[draw]
count = 3
"#;

fn write_triangle_scene(root: &Path) {
    fs::write(root.join("scene.toml"), MANIFEST).unwrap();
    fs::write(root.join("shader.vs.glsl"), VERTEX).unwrap();
    fs::write(root.join("shader.fs.glsl"), FRAGMENT).unwrap();
}

fn meshspin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_meshspin"));
    command.env_remove("MESHSPIN_SCENE").env("RUST_LOG", "warn");
    command
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

#[test]
fn headless_run_draws_every_frame() {
    let scene = TempDir::new().unwrap();
    write_triangle_scene(scene.path());

    let output = meshspin()
        .arg("run")
        .arg(scene.path())
        .args(["--headless", "--frames", "5"])
        .output()
        .expect("failed to run meshspin");

    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("tri: 5 frames drawn, 0 skipped"), "{out}");
    assert!(out.contains("arrays 3 from 0"), "{out}");
}

#[test]
fn scene_falls_back_to_environment() {
    let scene = TempDir::new().unwrap();
    write_triangle_scene(scene.path());

    let output = meshspin()
        .env("MESHSPIN_SCENE", scene.path().join("scene.toml"))
        .args(["run", "--headless", "--frames", "2"])
        .output()
        .expect("failed to run meshspin");

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("2 frames drawn"));
}

#[test]
fn run_without_scene_fails() {
    let output = meshspin()
        .args(["run", "--headless"])
        .output()
        .expect("failed to run meshspin");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("no scene given"));
}

#[test]
fn check_reports_compile_failure() {
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken.vs.glsl");
    fs::write(&broken, "#version 450\nvoid main() { gl_Position = vec4(1.0) }\n").unwrap();

    let output = meshspin()
        .arg("check")
        .arg(&broken)
        .args(["--stage", "vertex"])
        .output()
        .expect("failed to run meshspin");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to compile vertex shader"));
}

#[test]
fn check_accepts_valid_stage_and_rejects_misspelled_one() {
    let scene = TempDir::new().unwrap();
    write_triangle_scene(scene.path());
    let fragment = scene.path().join("shader.fs.glsl");

    let output = meshspin()
        .arg("check")
        .arg(&fragment)
        .args(["--stage", "fragment"])
        .output()
        .expect("failed to run meshspin");
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("fragment shader compiles"));

    let output = meshspin()
        .arg("check")
        .arg(&fragment)
        .args(["--stage", "fragement"])
        .output()
        .expect("failed to run meshspin");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("expected vertex or fragment"));
}

#[test]
fn check_scene_reports_bound_attributes() {
    let scene = TempDir::new().unwrap();
    write_triangle_scene(scene.path());

    let output = meshspin()
        .arg("check")
        .arg(scene.path())
        .output()
        .expect("failed to run meshspin");

    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("program links and validates"), "{out}");
    assert!(out.contains("2 attributes bound, draw count 3"), "{out}");
}

#[test]
fn check_scene_rejects_input_without_layout() {
    let scene = TempDir::new().unwrap();
    write_triangle_scene(scene.path());
    let vertex = VERTEX.replace(
        "layout(location = 1) in vec3 vertColor;",
        "layout(location = 1) in vec3 vertColor;\nlayout(location = 2) in vec3 vertNormal;",
    );
    fs::write(scene.path().join("shader.vs.glsl"), vertex).unwrap();

    let output = meshspin()
        .arg("check")
        .arg(scene.path())
        .output()
        .expect("failed to run meshspin");

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("failed to set up"), "{err}");
    assert!(err.contains("'vertNormal' at location 2 has no attribute layout"), "{err}");
}

#[test]
fn bundled_demos_run_headless() {
    for (name, draw) in [
        ("triangle", "arrays 3 from 0"),
        ("cube", "indexed 36 (Uint16)"),
        ("gem", "indexed 24 (Uint16)"),
    ] {
        let output = meshspin()
            .arg("run")
            .arg(demo(name))
            .args(["--headless", "--frames", "3", "--validate"])
            .output()
            .expect("failed to run meshspin");

        assert!(output.status.success(), "{name}: {}", stderr(&output));
        let out = stdout(&output);
        assert!(out.contains("3 frames drawn"), "{name}: {out}");
        assert!(out.contains(draw), "{name}: {out}");
    }
}
